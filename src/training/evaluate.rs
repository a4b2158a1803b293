//! Model evaluation
//!
//! Loss, accuracy and the confusion matrix over a whole dataset, without
//! dropout. Used for the per-epoch validation pass and for scoring a saved
//! checkpoint on the test split.

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    nn::loss::BinaryCrossEntropyLossConfig,
    tensor::{activation::sigmoid, backend::Backend, ElementConversion},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::checkpoint::load_model;
use crate::config::ExperimentConfig;
use crate::dataset::{load_split, PetBatch, PetBatcher, PetDataset, Split};
use crate::model::{XceptionLike, XceptionLikeConfig};
use crate::utils::error::{Error, Result};
use crate::utils::metrics::{BinaryConfusion, RunningMetrics};

/// Metrics of one evaluation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub loss: f64,
    pub accuracy: f64,
    pub samples: usize,
    pub confusion: BinaryConfusion,
}

/// Score `model` on every item of `dataset`, in order
pub fn evaluate_model<B: Backend>(
    model: &XceptionLike<B>,
    dataset: &PetDataset,
    batcher: &PetBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Result<EvalReport> {
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);

    let mut running = RunningMetrics::new();
    let mut confusion = BinaryConfusion::default();

    let len = dataset.len();
    for start in (0..len).step_by(batch_size.max(1)) {
        let end = (start + batch_size).min(len);
        let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }
        let labels: Vec<usize> = items.iter().map(|item| item.label).collect();
        let n = labels.len();

        let batch: PetBatch<B> = batcher.batch(items, device);
        let logits = model.forward_logits(batch.images);
        let loss = loss_fn.forward(logits.clone(), batch.targets.reshape([n, 1]));
        let loss_value: f64 = loss.into_scalar().elem();

        let probabilities: Vec<f32> = sigmoid(logits)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| Error::Training(format!("Failed to read predictions: {:?}", e)))?;

        let batch_confusion = BinaryConfusion::from_probabilities(&probabilities, &labels);
        running.update(
            loss_value,
            batch_confusion.true_positives + batch_confusion.true_negatives,
            n,
        );
        confusion.merge(&batch_confusion);
    }

    Ok(EvalReport {
        loss: running.loss(),
        accuracy: running.accuracy(),
        samples: running.samples(),
        confusion,
    })
}

/// Load the saved checkpoint and score it on the test split
pub fn evaluate<B: Backend>(config: &ExperimentConfig, device: &B::Device) -> Result<EvalReport> {
    let model_config = XceptionLikeConfig::from_model_config(&config.model);
    let stem = config.training.checkpoint_path();
    let model = load_model::<B>(&model_config, &stem, device)?;
    info!("Loaded checkpoint {:?}", stem);

    let test = load_split(&config.data, Split::Test)?;
    let batcher = PetBatcher::new(config.data.image_size, config.data.rescale);

    let report = evaluate_model(&model, &test, &batcher, config.data.batch_size, device)?;
    info!(
        "Test: loss {:.4}, accuracy {:.2}% over {} images",
        report.loss,
        report.accuracy * 100.0,
        report.samples
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::PetItem;
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    #[test]
    fn test_evaluate_counts_every_item() {
        let device = Default::default();
        let model = XceptionLikeConfig::new()
            .with_block_filters(vec![4])
            .init::<TestBackend>(&device);

        let items: Vec<PetItem> = (0..5)
            .map(|i| PetItem::from_image(RgbImage::from_pixel(12, 12, Rgb([i * 40, 0, 0])), (i % 2) as usize, String::new()))
            .collect();
        let dataset = PetDataset::from_items(items, 12);
        let batcher = PetBatcher::new(12, true);

        let report = evaluate_model(&model, &dataset, &batcher, 2, &device).unwrap();
        assert_eq!(report.samples, 5);
        assert_eq!(report.confusion.total(), 5);
        assert!(report.loss.is_finite() && report.loss > 0.0);
        assert!((0.0..=1.0).contains(&report.accuracy));
        assert!((report.accuracy - report.confusion.accuracy()).abs() < 1e-9);
    }
}
