use std::fs;
use std::path::Path;

use burn::backend::Autodiff;
use burn_ndarray::NdArray;
use image::{Rgb, RgbImage};

use like_xception::config::{ExperimentConfig, SplitRange};
use like_xception::dataset::partition::{make_partitions, source_file_name};
use like_xception::training::checkpoint::{info_file, record_file, CheckpointInfo};
use like_xception::training::{evaluate, fit, TrainingHistory};

type Backend = NdArray<f32>;

/// Cats are dark, dogs are bright
fn write_images(dir: &Path, per_class: usize) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..per_class {
        let shade = (i * 3) as u8;
        RgbImage::from_pixel(40, 30, Rgb([20 + shade, 20, 20]))
            .save(dir.join(source_file_name("cat", i)))
            .unwrap();
        RgbImage::from_pixel(40, 30, Rgb([200 + shade, 220, 230]))
            .save(dir.join(source_file_name("dog", i)))
            .unwrap();
    }
}

fn small_config(root: &Path) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.data.source_dir = root.join("extracted");
    config.data.base_dir = root.join("small");
    config.data.image_size = 32;
    config.data.batch_size = 4;
    config.data.rescale = true;
    config.data.train = SplitRange::new(0, 8);
    config.data.validation = SplitRange::new(8, 12);
    config.data.test = SplitRange::new(12, 16);
    config.model.block_filters = vec![8, 16];
    config.training.epochs = 2;
    config.training.output_dir = root.join("output");
    config
}

#[test]
fn fit_writes_checkpoint_and_history() {
    let temp = tempfile::tempdir().unwrap();
    let config = small_config(temp.path());
    write_images(&config.data.source_dir, 16);
    make_partitions(&config.data).unwrap();

    let device = Default::default();
    let summary = fit::<Autodiff<Backend>>(&config, &device).unwrap();

    assert_eq!(summary.epochs, 2);
    assert!(summary.best_val_loss.is_finite());

    let history = TrainingHistory::load(&config.training.history_path()).unwrap();
    assert_eq!(history.len(), 2);
    // The first finite validation loss always beats +inf
    assert!(history.epochs[0].checkpointed);
    for (i, logs) in history.epochs.iter().enumerate() {
        assert_eq!(logs.epoch, i + 1);
        assert!((0.0..=1.0).contains(&logs.accuracy));
        assert!((0.0..=1.0).contains(&logs.val_accuracy));
    }
    // A later epoch is saved only on strict improvement
    let second = &history.epochs[1];
    assert_eq!(second.checkpointed, second.val_loss < history.epochs[0].val_loss);

    let stem = config.training.checkpoint_path();
    assert!(record_file(&stem).is_file());
    let info = CheckpointInfo::load(&info_file(&stem)).unwrap();
    assert_eq!(Some(info.epoch), summary.best_epoch);
    assert_eq!(info.val_loss, summary.best_val_loss);

    let report = evaluate::<Backend>(&config, &device).unwrap();
    assert_eq!(report.samples, 8);
    assert_eq!(report.confusion.total(), 8);
}

#[test]
fn evaluate_without_checkpoint_fails() {
    let temp = tempfile::tempdir().unwrap();
    let config = small_config(temp.path());
    let device = Default::default();
    assert!(evaluate::<Backend>(&config, &device).is_err());
}
