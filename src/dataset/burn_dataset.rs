//! Burn Dataset Integration
//!
//! `PetDataset` implements Burn's `Dataset` trait over decoded, resized RGB
//! images held in memory; `PetBatcher` turns a list of items into an image
//! tensor `[N, 3, H, W]` and a label tensor `[N]`.
//!
//! Items are cached as 8-bit RGB and converted to `f32` per batch, which keeps
//! the cache at a quarter of the float size and lets training batches be
//! augmented on the fly.

use std::path::Path;
use std::sync::{Arc, Mutex};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::info;

use super::augmentation::{AugmentationConfig, Augmenter};
use super::loader::ImageSample;
use crate::utils::error::{Error, Result};
use crate::CHANNELS;

/// A decoded image with its label
#[derive(Clone, Debug)]
pub struct PetItem {
    /// Resized RGB image, square of side `image_size`
    pub image: RgbImage,
    /// 0 = first class alphabetically, 1 = second
    pub label: usize,
    /// Image path (for logging)
    pub path: String,
}

impl PetItem {
    /// Decode an image file and resize it to `image_size × image_size`
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        let decoded = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| Error::Image(path.to_path_buf(), e.to_string()))?;

        let image = decoded
            .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
            .to_rgb8();

        Ok(Self {
            image,
            label,
            path: path.to_string_lossy().to_string(),
        })
    }

    pub fn from_image(image: RgbImage, label: usize, path: String) -> Self {
        Self { image, label, path }
    }
}

/// Convert an RGB image to a flattened CHW float array.
/// Values stay in `[0, 255]` unless `rescale` maps them to `[0, 1]`.
pub fn to_chw(img: &RgbImage, rescale: bool) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let scale = if rescale { 1.0 / 255.0 } else { 1.0 };

    let mut data = vec![0.0f32; CHANNELS * plane];
    for (i, pixel) in img.pixels().enumerate() {
        for c in 0..CHANNELS {
            data[c * plane + i] = pixel[c] as f32 * scale;
        }
    }
    data
}

/// Decode `samples` on the rayon pool, advancing `pb` once per image
fn decode_all(samples: &[ImageSample], image_size: usize, pb: &ProgressBar) -> Result<Vec<PetItem>> {
    samples
        .par_iter()
        .map(|sample| {
            let item = PetItem::from_path(&sample.path, sample.label, image_size);
            pb.inc(1);
            item
        })
        .collect()
}

/// In-memory dataset of decoded images
#[derive(Debug, Clone)]
pub struct PetDataset {
    items: Vec<PetItem>,
    image_size: usize,
}

impl PetDataset {
    /// Decode and resize every sample up front, in parallel.
    /// Fails on the first image that cannot be read.
    pub fn new_cached(samples: Vec<ImageSample>, image_size: usize) -> Result<Self> {
        let total = samples.len();
        info!("Pre-loading {} images into memory", total);

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let items = decode_all(&samples, image_size, &pb)?;
        pb.finish_and_clear();
        info!("Loaded {} images", items.len());

        Ok(Self { items, image_size })
    }

    /// Wrap already decoded items
    pub fn from_items(items: Vec<PetItem>, image_size: usize) -> Self {
        Self { items, image_size }
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Items per label, indexed by label
    pub fn class_distribution(&self) -> Vec<usize> {
        let num_classes = self.items.iter().map(|i| i.label + 1).max().unwrap_or(0);
        let mut counts = vec![0usize; num_classes];
        for item in &self.items {
            counts[item.label] += 1;
        }
        counts
    }
}

impl Dataset<PetItem> for PetDataset {
    fn get(&self, index: usize) -> Option<PetItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of images and binary labels
#[derive(Clone, Debug)]
pub struct PetBatch<B: Backend> {
    /// Shape `[batch_size, 3, height, width]`
    pub images: Tensor<B, 4>,
    /// Shape `[batch_size]`
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher that stacks items into tensors, optionally augmenting them first
#[derive(Clone, Debug)]
pub struct PetBatcher {
    image_size: usize,
    rescale: bool,
    augmenter: Option<Augmenter>,
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl PetBatcher {
    /// Plain batcher for validation, test and inference
    pub fn new(image_size: usize, rescale: bool) -> Self {
        Self {
            image_size,
            rescale,
            augmenter: None,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(0))),
        }
    }

    /// Training batcher applying random augmentation from a seeded stream
    pub fn augmenting(image_size: usize, rescale: bool, config: AugmentationConfig, seed: u64) -> Self {
        let augmenter = (!config.is_identity()).then(|| Augmenter::new(config));
        Self {
            image_size,
            rescale,
            augmenter,
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    pub fn is_augmenting(&self) -> bool {
        self.augmenter.is_some()
    }
}

impl<B: Backend> Batcher<B, PetItem, PetBatch<B>> for PetBatcher {
    fn batch(&self, items: Vec<PetItem>, device: &B::Device) -> PetBatch<B> {
        let batch_size = items.len();
        let (height, width) = (self.image_size, self.image_size);

        let mut images_data = Vec::with_capacity(batch_size * CHANNELS * height * width);
        match &self.augmenter {
            Some(augmenter) => {
                let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                for item in &items {
                    let augmented = augmenter.augment(&item.image, &mut rng);
                    images_data.extend(to_chw(&augmented, self.rescale));
                }
            }
            None => {
                for item in &items {
                    images_data.extend(to_chw(&item.image, self.rescale));
                }
            }
        }

        let images = Tensor::<B, 4>::from_floats(
            TensorData::new(images_data, [batch_size, CHANNELS, height, width]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        PetBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::Rgb;

    type TestBackend = NdArray;

    fn item(value: u8, label: usize) -> PetItem {
        PetItem::from_image(RgbImage::from_pixel(4, 4, Rgb([value, 0, 255])), label, String::new())
    }

    #[test]
    fn test_to_chw_layout_and_range() {
        let img = RgbImage::from_fn(2, 1, |x, _| Rgb([x as u8, 10, 255]));
        assert_eq!(to_chw(&img, false), vec![0.0, 1.0, 10.0, 10.0, 255.0, 255.0]);

        let scaled = to_chw(&img, true);
        assert!((scaled[5] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_batch_shapes_and_labels() {
        let device = Default::default();
        let batcher = PetBatcher::new(4, false);
        let batch: PetBatch<TestBackend> =
            batcher.batch(vec![item(1, 0), item(2, 1), item(3, 1)], &device);

        assert_eq!(batch.images.dims(), [3, 3, 4, 4]);
        assert_eq!(batch.targets.dims(), [3]);

        let labels: Vec<i64> = batch.targets.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![0, 1, 1]);

        let max = batch.images.max().into_scalar();
        assert_eq!(max, 255.0);
    }

    #[test]
    fn test_identity_augmentation_is_disabled() {
        let batcher = PetBatcher::augmenting(4, false, AugmentationConfig::none(), 1);
        assert!(!batcher.is_augmenting());
        let batcher = PetBatcher::augmenting(4, false, AugmentationConfig::default(), 1);
        assert!(batcher.is_augmenting());
    }

    #[test]
    fn test_dataset_access_and_distribution() {
        let dataset = PetDataset::from_items(vec![item(0, 0), item(0, 1), item(0, 1)], 4);
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.get(1).map(|i| i.label), Some(1));
        assert!(dataset.get(3).is_none());
        assert_eq!(dataset.class_distribution(), vec![1, 2]);
    }

    #[test]
    fn test_cached_load_resizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.0.png");
        RgbImage::from_pixel(10, 6, Rgb([5, 6, 7])).save(&path).unwrap();

        let samples = vec![ImageSample {
            path,
            label: 0,
            class_name: "cat".to_string(),
        }];
        let dataset = PetDataset::new_cached(samples, 8).unwrap();
        let item = dataset.get(0).unwrap();
        assert_eq!(item.image.dimensions(), (8, 8));
        assert_eq!(*item.image.get_pixel(3, 3), Rgb([5, 6, 7]));
    }

    #[test]
    fn test_progress_advances_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let samples: Vec<ImageSample> = (0..7)
            .map(|i| {
                let path = dir.path().join(format!("cat.{i}.png"));
                RgbImage::from_pixel(5, 5, Rgb([i as u8, 0, 0])).save(&path).unwrap();
                ImageSample {
                    path,
                    label: 0,
                    class_name: "cat".to_string(),
                }
            })
            .collect();

        let pb = ProgressBar::hidden();
        let items = decode_all(&samples, 4, &pb).unwrap();
        assert_eq!(items.len(), 7);
        assert_eq!(pb.position(), 7);
    }

    #[test]
    fn test_unreadable_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dog.0.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let samples = vec![ImageSample {
            path,
            label: 1,
            class_name: "dog".to_string(),
        }];
        let err = PetDataset::new_cached(samples, 8).unwrap_err();
        assert!(matches!(err, Error::Image(_, _)));
    }
}
