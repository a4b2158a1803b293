//! Dataset partitioning
//!
//! Copies `{category}.{index}.jpg` files from the extracted source directory
//! into `base_dir/{train,validation,test}/{category}/`, taking each split's
//! index range from every category.
//!
//! The tree is assembled in a staging directory next to `base_dir` and
//! renamed into place once every file is copied, so an existing `base_dir`
//! is always complete and is never touched again.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::loader::is_image_file;
use super::Split;
use crate::config::DataConfig;
use crate::utils::error::{Error, Result};

/// Name of the statistics file written at the partition root
pub const STATS_FILE: &str = "partition.json";

/// Image counts per split and category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    /// split name -> category -> number of files
    pub counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl PartitionStats {
    pub fn count(&self, split: Split, category: &str) -> usize {
        self.counts
            .get(split.dir_name())
            .and_then(|c| c.get(category))
            .copied()
            .unwrap_or(0)
    }

    pub fn split_total(&self, split: Split) -> usize {
        self.counts
            .get(split.dir_name())
            .map(|c| c.values().sum())
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        Split::ALL.iter().map(|s| self.split_total(*s)).sum()
    }
}

/// What `make_partitions` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// The tree was created and these files were copied
    Created(PartitionStats),
    /// `base_dir` already existed; nothing was copied
    Skipped,
}

/// Source file name for one category and index
pub fn source_file_name(category: &str, index: usize) -> String {
    format!("{category}.{index}.jpg")
}

/// Build the partitioned tree unless `config.base_dir` already exists
pub fn make_partitions(config: &DataConfig) -> Result<PartitionOutcome> {
    if config.base_dir.exists() {
        info!(
            "Partition directory {:?} exists, skipping copy",
            config.base_dir
        );
        return Ok(PartitionOutcome::Skipped);
    }
    if !config.source_dir.is_dir() {
        return Err(Error::NotFound(config.source_dir.clone()));
    }

    let staging = staging_dir(&config.base_dir);
    if staging.exists() {
        warn!("Removing stale staging directory {:?}", staging);
        fs::remove_dir_all(&staging)?;
    }

    match copy_all(config, &staging) {
        Ok(stats) => {
            let json = serde_json::to_string_pretty(&stats)?;
            fs::write(staging.join(STATS_FILE), json)?;
            fs::rename(&staging, &config.base_dir)?;
            info!(
                "Partitioned {} images into {:?}",
                stats.total(),
                config.base_dir
            );
            Ok(PartitionOutcome::Created(stats))
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!("Failed to remove staging directory {:?}: {}", staging, cleanup);
            }
            Err(e)
        }
    }
}

fn copy_all(config: &DataConfig, dest_root: &Path) -> Result<PartitionStats> {
    let mut stats = PartitionStats::default();

    for split in Split::ALL {
        let range = split.range(config);
        let split_counts = stats.counts.entry(split.dir_name().to_string()).or_default();

        for category in &config.categories {
            let dir = dest_root.join(split.dir_name()).join(category);
            fs::create_dir_all(&dir)?;

            for index in range.indices() {
                let fname = source_file_name(category, index);
                let src = config.source_dir.join(&fname);
                if !src.is_file() {
                    return Err(Error::NotFound(src));
                }
                fs::copy(&src, dir.join(&fname))?;
            }

            info!("  {}/{}: {} images", split, category, range.len());
            split_counts.insert(category.clone(), range.len());
        }
    }

    Ok(stats)
}

/// Count the image files of an existing partitioned tree
pub fn partition_stats(config: &DataConfig) -> Result<PartitionStats> {
    if !config.base_dir.is_dir() {
        return Err(Error::NotFound(config.base_dir.clone()));
    }

    let mut stats = PartitionStats::default();
    for split in Split::ALL {
        let split_counts = stats.counts.entry(split.dir_name().to_string()).or_default();
        for category in &config.categories {
            let dir = config.split_dir(split.dir_name()).join(category);
            let count = if dir.is_dir() {
                fs::read_dir(&dir)?
                    .filter_map(|e| e.ok())
                    .filter(|e| is_image_file(&e.path()))
                    .count()
            } else {
                0
            };
            split_counts.insert(category.clone(), count);
        }
    }
    Ok(stats)
}

fn staging_dir(base_dir: &Path) -> PathBuf {
    let mut name = base_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    base_dir.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitRange;
    use std::collections::HashSet;

    fn small_config(root: &Path) -> DataConfig {
        let source = root.join("extracted");
        fs::create_dir_all(&source).unwrap();
        for category in ["cat", "dog"] {
            for i in 0..10 {
                fs::write(source.join(source_file_name(category, i)), b"jpeg").unwrap();
            }
        }
        DataConfig {
            source_dir: source,
            base_dir: root.join("small"),
            train: SplitRange::new(0, 4),
            validation: SplitRange::new(4, 6),
            test: SplitRange::new(6, 10),
            ..DataConfig::default()
        }
    }

    #[test]
    fn test_counts_per_split_and_category() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());

        let outcome = make_partitions(&config).unwrap();
        let PartitionOutcome::Created(stats) = outcome else {
            panic!("expected partition to be created");
        };

        for category in ["cat", "dog"] {
            assert_eq!(stats.count(Split::Train, category), 4);
            assert_eq!(stats.count(Split::Validation, category), 2);
            assert_eq!(stats.count(Split::Test, category), 4);
        }
        assert_eq!(stats.total(), 20);
        assert_eq!(partition_stats(&config).unwrap(), stats);
        assert!(config.base_dir.join(STATS_FILE).is_file());
    }

    #[test]
    fn test_splits_share_no_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        make_partitions(&config).unwrap();

        let mut seen = HashSet::new();
        for split in Split::ALL {
            for entry in walkdir::WalkDir::new(config.split_dir(split.dir_name())) {
                let entry = entry.unwrap();
                if entry.file_type().is_file() {
                    let name = entry.file_name().to_string_lossy().to_string();
                    assert!(seen.insert(name), "file copied into two splits");
                }
            }
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_second_run_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        make_partitions(&config).unwrap();

        let marker = config.split_dir("train").join("cat").join("cat.0.jpg");
        fs::write(&marker, b"changed").unwrap();

        assert_eq!(make_partitions(&config).unwrap(), PartitionOutcome::Skipped);
        assert_eq!(fs::read(&marker).unwrap(), b"changed");
    }

    #[test]
    fn test_missing_source_file_leaves_no_tree() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path());
        fs::remove_file(config.source_dir.join("dog.7.jpg")).unwrap();

        let err = make_partitions(&config).unwrap_err();
        match err {
            Error::NotFound(path) => assert!(path.ends_with("dog.7.jpg")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!config.base_dir.exists());
        assert!(!staging_dir(&config.base_dir).exists());
    }

    #[test]
    fn test_staging_dir_is_sibling() {
        assert_eq!(
            staging_dir(Path::new("data/cats_vs_dogs_small")),
            PathBuf::from("data/cats_vs_dogs_small.partial")
        );
    }
}
