//! Supervised training loop
//!
//! A hand-written fit loop over Burn's autodiff API: RMSProp, binary
//! cross-entropy on the pre-sigmoid logit, accuracy at a 0.5 threshold, a
//! validation pass after every epoch and best-only checkpointing on
//! validation loss.

use std::path::PathBuf;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::AutodiffModule,
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer, RmsPropConfig},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::checkpoint::{record_file, ModelCheckpoint};
use super::evaluate::evaluate_model;
use super::history::{EpochLogs, TrainingHistory, TrainingPhase};
use crate::config::ExperimentConfig;
use crate::dataset::{load_split, AugmentationConfig, PetBatch, PetBatcher, PetDataset, Split};
use crate::model::XceptionLikeConfig;
use crate::utils::error::Result;
use crate::utils::format_duration;
use crate::utils::logging::EpochTimer;
use crate::utils::metrics::RunningMetrics;

/// Outcome of a completed `fit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    pub epochs: usize,
    /// One-based epoch with the lowest validation loss
    pub best_epoch: Option<usize>,
    pub best_val_loss: f64,
    /// Checkpoint stem; the record file carries the recorder's extension
    pub checkpoint: PathBuf,
    pub history_path: PathBuf,
    pub total_secs: f64,
}

/// Train on the `train` split, validate on `validation`, keep the best model
///
/// # Type Parameters
/// * `B` - The autodiff backend (e.g. `Autodiff<NdArray>`)
pub fn fit<B: AutodiffBackend>(config: &ExperimentConfig, device: &B::Device) -> Result<FitSummary> {
    config.validate()?;
    std::fs::create_dir_all(&config.training.output_dir)?;

    println!("{}", "Loading Dataset...".cyan());
    let train_dataset = load_split(&config.data, Split::Train)?;
    let val_dataset = load_split(&config.data, Split::Validation)?;

    let augmentation = if config.data.augment {
        AugmentationConfig::default()
    } else {
        AugmentationConfig::none()
    };
    let train_batcher = PetBatcher::augmenting(
        config.data.image_size,
        config.data.rescale,
        augmentation,
        config.seed,
    );
    let val_batcher = PetBatcher::new(config.data.image_size, config.data.rescale);

    let model_config = XceptionLikeConfig::from_model_config(&config.model);
    let mut model = model_config.init::<B>(device);

    let mut optimizer = RmsPropConfig::new()
        .with_alpha(config.training.rho)
        .with_epsilon(config.training.epsilon)
        .init();
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);

    let epochs = config.training.epochs;
    let batch_size = config.data.batch_size;
    let learning_rate = config.training.learning_rate;

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Training samples:   {}", train_dataset.len());
    println!(
        "  Per class:          {}",
        class_balance(&config.data.categories, &train_dataset)
    );
    println!("  Validation samples: {}", val_dataset.len());
    println!("  Epochs:             {}", epochs);
    println!("  Batch size:         {}", batch_size);
    println!("  Learning rate:      {}", learning_rate);
    println!("  Augmentation:       {}", train_batcher.is_augmenting());
    println!("  Device:             {:?}", device);
    println!();

    let mut checkpoint = ModelCheckpoint::new(config.training.checkpoint_path());
    let mut history = TrainingHistory::new();
    let mut timer = EpochTimer::new(epochs);
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut phase = TrainingPhase::NotStarted;
    info!("Training {}", phase);

    for epoch in 0..epochs {
        phase = TrainingPhase::Epoch {
            current: epoch + 1,
            total: epochs,
        };
        debug!("Training {}", phase);
        timer.start_epoch(epoch);
        println!("{}", format!("Epoch {}/{}", epoch + 1, epochs).yellow().bold());

        let indices = epoch_order(&train_dataset, config.data.shuffle, &mut epoch_rng);
        let num_batches = indices.len().div_ceil(batch_size);
        let pb = batch_progress(num_batches);
        let mut train_metrics = RunningMetrics::new();

        for chunk in indices.chunks(batch_size) {
            let items: Vec<_> = chunk.iter().filter_map(|&i| train_dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }
            let n = items.len();
            let batch: PetBatch<B> = train_batcher.batch(items, device);

            let logits = model.forward_logits(batch.images);
            let targets = batch.targets.reshape([n, 1]);
            let loss = loss_fn.forward(logits.clone(), targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            train_metrics.update(loss_value, count_correct(logits, targets), n);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(learning_rate, model, grads);

            pb.inc(1);
            pb.set_message(format!(
                "loss {:.4} acc {:.2}%",
                train_metrics.loss(),
                train_metrics.accuracy() * 100.0
            ));
        }
        pb.finish_and_clear();

        let valid_model = model.valid();
        let val = evaluate_model(
            &valid_model,
            &val_dataset,
            &val_batcher,
            batch_size,
            device,
        )?;

        let mut logs = EpochLogs {
            epoch: epoch + 1,
            loss: train_metrics.loss(),
            accuracy: train_metrics.accuracy(),
            val_loss: val.loss,
            val_accuracy: val.accuracy,
            checkpointed: false,
            duration_secs: 0.0,
        };
        if !logs.val_loss.is_finite() {
            warn!("Epoch {}: validation loss is {}", logs.epoch, logs.val_loss);
        }
        logs.checkpointed = checkpoint.on_epoch_end::<B::InnerBackend, _>(&valid_model, &logs)?;
        logs.duration_secs = timer.epoch_secs();

        println!(
            "  {} loss: {:.4} - accuracy: {:.4} - val_loss: {:.4} - val_accuracy: {:.4} ({}, ETA {}){}",
            "→".cyan(),
            logs.loss,
            logs.accuracy,
            logs.val_loss,
            logs.val_accuracy,
            format_duration(logs.duration_secs),
            format_duration(timer.eta_secs()),
            if logs.checkpointed {
                " saved".green().to_string()
            } else {
                String::new()
            }
        );
        history.push(logs);
    }

    phase = TrainingPhase::Completed;
    info!("Training {} after {}", phase, format_duration(timer.total_secs()));

    let history_path = config.training.history_path();
    history.save(&history_path)?;

    let best = history.best_epoch();
    let summary = FitSummary {
        epochs: history.len(),
        best_epoch: best.map(|e| e.epoch),
        best_val_loss: checkpoint.best(),
        checkpoint: checkpoint.stem().to_path_buf(),
        history_path,
        total_secs: timer.total_secs(),
    };

    println!();
    println!("{}", "Training Complete!".green().bold());
    match summary.best_epoch {
        Some(e) => println!(
            "  Best val_loss {:.4} at epoch {}, model in {:?}",
            summary.best_val_loss,
            e,
            record_file(&summary.checkpoint)
        ),
        None => println!("  No finite validation loss; no checkpoint written"),
    }

    Ok(summary)
}

/// Samples whose logit falls on the side of 0 given by their label.
/// A logit of exactly 0 (probability 0.5) predicts the negative class.
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2, Int>) -> usize {
    let correct: i64 = logits
        .greater_elem(0.0)
        .int()
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem();
    correct as usize
}

/// `cat: 1000, dog: 1000` style listing of items per label
fn class_balance(categories: &[String], dataset: &PetDataset) -> String {
    dataset
        .class_distribution()
        .iter()
        .enumerate()
        .map(|(label, count)| {
            let name = categories.get(label).map(String::as_str).unwrap_or("?");
            format!("{name}: {count}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Training order for one epoch
fn epoch_order(dataset: &PetDataset, shuffle: bool, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    if shuffle {
        indices.shuffle(rng);
    }
    indices
}

fn batch_progress(num_batches: usize) -> ProgressBar {
    let pb = ProgressBar::new(num_batches as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}
