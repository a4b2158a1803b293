//! # like_xception
//!
//! Cats vs. dogs image classification with an Xception-style convolutional
//! network, built on the Burn framework.
//!
//! ## Pipeline
//!
//! 1. **Partition** an extracted `cat.{i}.jpg` / `dog.{i}.jpg` directory into
//!    `train/`, `validation/` and `test/` trees (skipped when already present)
//! 2. **Load** each tree into cached, batched image/label tensors
//! 3. **Build** the separable-convolution residual network
//! 4. **Fit** with RMSProp and binary cross-entropy, checkpointing the model
//!    whenever validation loss improves
//!
//! ## Modules
//!
//! - `config`: TOML-backed experiment configuration
//! - `dataset`: partitioning, directory loading, augmentation and batching
//! - `model`: the network and its layer summary
//! - `training`: fit loop, checkpoint callback, history and evaluation
//! - `utils`: errors, logging and binary classification metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use like_xception::backend::{default_device, TrainingBackend};
//! use like_xception::config::ExperimentConfig;
//! use like_xception::dataset::partition::make_partitions;
//! use like_xception::training::fit;
//!
//! let config = ExperimentConfig::default();
//! make_partitions(&config.data)?;
//! let summary = fit::<TrainingBackend>(&config, &default_device())?;
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod model;
pub mod training;
pub mod utils;

pub use config::{DataConfig, ExperimentConfig, ModelConfig, TrainingConfig};
pub use dataset::{PetBatch, PetBatcher, PetDataset, PetItem};
pub use model::{XceptionLike, XceptionLikeConfig};
pub use training::{fit, FitSummary, ModelCheckpoint, TrainingHistory};
pub use utils::error::{Error, Result};

/// Default square input size in pixels
pub const IMAGE_SIZE: usize = 180;

/// Number of image channels (RGB)
pub const CHANNELS: usize = 3;
