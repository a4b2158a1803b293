//! Directory-per-class image loader
//!
//! A split directory holds one subdirectory per class. Class names sorted
//! alphabetically give the label indices, so `cat` is 0 and `dog` is 1.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::utils::error::{Error, Result};

/// File extensions accepted as images
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

/// A single image file with its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    pub path: PathBuf,
    /// Index of the class directory in sorted order
    pub label: usize,
    pub class_name: String,
}

/// Labeled image files found under one split directory
#[derive(Debug, Clone)]
pub struct ImageFolder {
    pub root_dir: PathBuf,
    pub samples: Vec<ImageSample>,
    /// Class names indexed by label
    pub class_names: Vec<String>,
}

impl ImageFolder {
    /// Scan `root_dir` for class subdirectories and their image files
    ///
    /// ```text
    /// root_dir/
    /// ├── cat/
    /// │   ├── cat.0.jpg
    /// │   └── ...
    /// └── dog/
    ///     └── ...
    /// ```
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Scanning image folder: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(Error::NotFound(root_dir));
        }

        let mut class_names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_names.push(name.to_string());
                }
            }
        }
        class_names.sort();

        if class_names.is_empty() {
            return Err(Error::Dataset(format!(
                "no class directories in {}",
                root_dir.display()
            )));
        }

        let mut samples = Vec::new();
        for (label, class_name) in class_names.iter().enumerate() {
            let mut paths: Vec<PathBuf> = WalkDir::new(root_dir.join(class_name))
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| is_image_file(p))
                .collect();
            paths.sort();

            debug!("Class '{}' (label {}): {} images", class_name, label, paths.len());

            samples.extend(paths.into_iter().map(|path| ImageSample {
                path,
                label,
                class_name: class_name.clone(),
            }));
        }

        Ok(Self {
            root_dir,
            samples,
            class_names,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Number of samples per label
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            counts[sample.label] += 1;
        }
        counts
    }
}

/// Whether the path has one of the accepted image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_labels_follow_sorted_class_names() {
        let dir = tempfile::tempdir().unwrap();
        for (class, files) in [("dog", ["dog.1.jpg", "dog.0.jpg"]), ("cat", ["cat.0.jpg", "notes.txt"])] {
            fs::create_dir_all(dir.path().join(class)).unwrap();
            for f in files {
                fs::write(dir.path().join(class).join(f), b"x").unwrap();
            }
        }

        let folder = ImageFolder::new(dir.path()).unwrap();
        assert_eq!(folder.class_names, vec!["cat", "dog"]);
        assert_eq!(folder.len(), 3);
        assert_eq!(folder.class_counts(), vec![1, 2]);
        assert_eq!(folder.samples[0].label, 0);
        assert!(folder.samples[1].path.ends_with("dog/dog.0.jpg"));
        assert_eq!(folder.samples[2].class_name, "dog");
    }

    #[test]
    fn test_missing_directory() {
        let err = ImageFolder::new("/nonexistent/split").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a/cat.1.JPG")));
        assert!(is_image_file(Path::new("b.png")));
        assert!(!is_image_file(Path::new("c.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }
}
