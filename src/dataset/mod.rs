//! Dataset module
//!
//! - `partition`: copies the extracted `{category}.{index}.jpg` files into a
//!   `train/validation/test` tree
//! - `loader`: scans a split directory into labeled samples
//! - `augmentation`: random flip/rotation/zoom for training items
//! - `burn_dataset`: Burn `Dataset` and `Batcher` implementations

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;
pub mod partition;

pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{PetBatch, PetBatcher, PetDataset, PetItem};
pub use loader::{ImageFolder, ImageSample};
pub use partition::{make_partitions, PartitionOutcome, PartitionStats};

use std::fmt;

use crate::config::{DataConfig, SplitRange};

/// One of the three dataset partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    /// Directory name under the partition base directory
    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }

    /// File index range this split takes from every category
    pub fn range(self, config: &DataConfig) -> SplitRange {
        match self {
            Split::Train => config.train,
            Split::Validation => config.validation,
            Split::Test => config.test,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Load one split of the partitioned tree into an in-memory dataset
pub fn load_split(config: &DataConfig, split: Split) -> crate::Result<PetDataset> {
    let folder = ImageFolder::new(config.split_dir(split.dir_name()))?;
    tracing::info!(
        "{} split: {} images in {} classes",
        split,
        folder.len(),
        folder.num_classes()
    );
    PetDataset::new_cached(folder.samples, config.image_size)
}
