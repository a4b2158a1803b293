//! Experiment configuration.
//!
//! Every path and constant the pipeline uses lives here and is passed
//! explicitly to the dataset, model and training code. Defaults reproduce the
//! reference experiment; a TOML file can override any subset of fields.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Seed for the epoch shuffle order and augmentation
    pub seed: u64,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            data: DataConfig::default(),
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Read a TOML file. Missing sections and fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config {}: {e}", path.display())))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config {}: {e}", path.display())))?;

        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.model.validate(self.data.image_size)?;
        self.training.validate()
    }
}

/// A half-open range of file indices `[start, end)` taken per class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRange {
    pub start: usize,
    pub end: usize,
}

impl SplitRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn indices(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn overlaps(&self, other: &SplitRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Dataset location, partitioning and input pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Extracted directory holding `{category}.{index}.jpg` files
    pub source_dir: PathBuf,
    /// Root of the partitioned `train/validation/test` tree
    pub base_dir: PathBuf,
    /// Class names; also the file-name prefixes in `source_dir`
    pub categories: Vec<String>,
    /// Square resize target in pixels
    pub image_size: usize,
    pub batch_size: usize,
    /// Scale pixels from [0, 255] to [0, 1] before they reach the model
    pub rescale: bool,
    /// Apply random flip/rotation/zoom to training images
    pub augment: bool,
    /// Reshuffle training order every epoch
    pub shuffle: bool,
    pub train: SplitRange,
    pub validation: SplitRange,
    pub test: SplitRange,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("extracted_files/train"),
            base_dir: PathBuf::from("cats_vs_dogs_small"),
            categories: vec!["cat".to_string(), "dog".to_string()],
            image_size: crate::IMAGE_SIZE,
            batch_size: 32,
            rescale: false,
            augment: false,
            shuffle: true,
            train: SplitRange::new(0, 1000),
            validation: SplitRange::new(1000, 1500),
            test: SplitRange::new(1500, 2500),
        }
    }
}

impl DataConfig {
    pub fn split_dir(&self, split: &str) -> PathBuf {
        self.base_dir.join(split)
    }

    pub fn validate(&self) -> Result<()> {
        if self.categories.len() != 2 {
            return Err(Error::Config(format!(
                "binary classification needs exactly 2 categories, got {}",
                self.categories.len()
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than 0".to_string()));
        }
        let splits = [
            ("train", self.train),
            ("validation", self.validation),
            ("test", self.test),
        ];
        for (name, range) in &splits {
            if range.is_empty() {
                return Err(Error::Config(format!("{name} split is empty")));
            }
        }
        for (i, (a_name, a)) in splits.iter().enumerate() {
            for (b_name, b) in splits.iter().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(Error::Config(format!(
                        "{a_name} and {b_name} splits overlap"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Network hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Filters of the initial standard convolution
    pub stem_filters: usize,
    /// Kernel size of the initial standard convolution (valid padding)
    pub stem_kernel: usize,
    /// Width of each residual block, in order
    pub block_filters: Vec<usize>,
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            stem_filters: 32,
            stem_kernel: 5,
            block_filters: vec![32, 64, 128, 256, 512],
            dropout: 0.5,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self, image_size: usize) -> Result<()> {
        if self.block_filters.is_empty() {
            return Err(Error::Config("block_filters must not be empty".to_string()));
        }
        if self.block_filters.contains(&0) || self.stem_filters == 0 {
            return Err(Error::Config("filter counts must be positive".to_string()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Config("dropout must be in range [0.0, 1.0)".to_string()));
        }
        if self.stem_kernel == 0 || image_size < self.stem_kernel {
            return Err(Error::Config(format!(
                "image_size {image_size} is smaller than the stem kernel {}",
                self.stem_kernel
            )));
        }
        Ok(())
    }
}

/// Optimizer and fit loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// RMSProp learning rate
    pub learning_rate: f64,
    /// RMSProp discounting factor for the squared-gradient average
    pub rho: f32,
    /// RMSProp numerical stability term
    pub epsilon: f32,
    /// Directory for checkpoints and history
    pub output_dir: PathBuf,
    /// File stem of the best-model record inside `output_dir`
    pub checkpoint: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            learning_rate: 1e-3,
            rho: 0.9,
            epsilon: 1e-7,
            output_dir: PathBuf::from("output"),
            checkpoint: "like_Xception".to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join(&self.checkpoint)
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join("history.json")
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::Config("epochs must be greater than 0".to_string()));
        }
        if self.learning_rate <= 0.0 {
            return Err(Error::Config("learning_rate must be positive".to_string()));
        }
        if self.checkpoint.is_empty() {
            return Err(Error::Config("checkpoint name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_experiment() {
        let config = ExperimentConfig::default();
        assert_eq!(config.data.image_size, 180);
        assert_eq!(config.data.batch_size, 32);
        assert_eq!(config.data.train.len(), 1000);
        assert_eq!(config.data.validation.len(), 500);
        assert_eq!(config.data.test.len(), 1000);
        assert_eq!(config.model.block_filters, vec![32, 64, 128, 256, 512]);
        assert_eq!(config.training.epochs, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ExperimentConfig = toml::from_str(
            r#"
            seed = 7

            [training]
            epochs = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.checkpoint, "like_Xception");
        assert_eq!(config.data.categories, vec!["cat", "dog"]);
    }

    #[test]
    fn test_overlapping_splits_rejected() {
        let mut config = DataConfig::default();
        config.validation = SplitRange::new(900, 1500);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_model_validation() {
        let mut config = ModelConfig::default();
        config.dropout = 1.0;
        assert!(config.validate(180).is_err());

        let config = ModelConfig::default();
        assert!(config.validate(4).is_err());
        assert!(config.validate(180).is_ok());
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let loaded = ExperimentConfig::load(&path).unwrap();
        let default = ExperimentConfig::default();

        assert_eq!(loaded.seed, default.seed);
        assert_eq!(loaded.data.test, default.data.test);
        assert_eq!(loaded.model.block_filters, default.model.block_filters);
        assert_eq!(loaded.training.epsilon, default.training.epsilon);
        assert_eq!(loaded.training.checkpoint_path(), default.training.checkpoint_path());
    }

    #[test]
    fn test_save_load_roundtrip_preserves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.toml");

        let mut config = ExperimentConfig::default();
        config.training.output_dir = PathBuf::from("runs/a");
        config.save(&path).unwrap();

        let loaded = ExperimentConfig::load(&path).unwrap();
        assert_eq!(loaded.training.checkpoint_path(), PathBuf::from("runs/a/like_Xception"));
    }
}
