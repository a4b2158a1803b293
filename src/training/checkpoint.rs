//! Best-only model checkpointing on validation loss
//!
//! After every epoch the callback compares the epoch's validation loss with
//! the best seen so far (initially +∞). Only a strict improvement writes the
//! model record, together with a JSON sidecar describing that epoch.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::CompactRecorder,
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::history::EpochLogs;
use crate::model::{XceptionLike, XceptionLikeConfig};
use crate::utils::error::{Error, Result};

/// File extension the compact recorder appends to the checkpoint stem
pub const RECORD_EXTENSION: &str = "mpk";

/// Metadata stored next to the model record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub epoch: usize,
    pub monitor: String,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub loss: f64,
    pub accuracy: f64,
    pub timestamp: String,
}

impl CheckpointInfo {
    pub fn from_logs(logs: &EpochLogs) -> Self {
        Self {
            epoch: logs.epoch,
            monitor: "val_loss".to_string(),
            val_loss: logs.val_loss,
            val_accuracy: logs.val_accuracy,
            loss: logs.loss,
            accuracy: logs.accuracy,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Path with `.{ext}` appended to the full file name
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// The record file written for a checkpoint stem
pub fn record_file(stem: &Path) -> PathBuf {
    append_extension(stem, RECORD_EXTENSION)
}

/// The JSON sidecar written for a checkpoint stem
pub fn info_file(stem: &Path) -> PathBuf {
    append_extension(stem, "json")
}

/// Saves the model whenever validation loss strictly improves
#[derive(Debug, Clone)]
pub struct ModelCheckpoint {
    stem: PathBuf,
    best: f64,
}

impl ModelCheckpoint {
    /// `stem` is the checkpoint path without extension
    pub fn new(stem: PathBuf) -> Self {
        Self {
            stem,
            best: f64::INFINITY,
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn stem(&self) -> &Path {
        &self.stem
    }

    /// Record `val_loss` and report whether it beats the best so far.
    /// NaN never counts as an improvement.
    pub fn improves(&mut self, val_loss: f64) -> bool {
        if val_loss < self.best {
            self.best = val_loss;
            true
        } else {
            false
        }
    }

    /// Epoch-end hook. Returns whether the model was written.
    pub fn on_epoch_end<B: Backend, M: Module<B>>(&mut self, model: &M, logs: &EpochLogs) -> Result<bool> {
        let previous = self.best;
        if !self.improves(logs.val_loss) {
            debug!(
                "Epoch {}: val_loss {:.4} did not improve from {:.4}",
                logs.epoch, logs.val_loss, previous
            );
            return Ok(false);
        }

        if let Some(parent) = self.stem.parent() {
            fs::create_dir_all(parent)?;
        }
        model
            .clone()
            .save_file(self.stem.clone(), &CompactRecorder::new())
            .map_err(|e| Error::Model(format!("Failed to save checkpoint: {:?}", e)))?;
        CheckpointInfo::from_logs(logs).save(&info_file(&self.stem))?;

        info!(
            "Epoch {}: val_loss improved from {:.4} to {:.4}, saved {:?}",
            logs.epoch,
            previous,
            logs.val_loss,
            record_file(&self.stem)
        );
        Ok(true)
    }
}

/// Build a model from `config` and load the weights stored under `stem`
pub fn load_model<B: Backend>(
    config: &XceptionLikeConfig,
    stem: &Path,
    device: &B::Device,
) -> Result<XceptionLike<B>> {
    let file = record_file(stem);
    if !file.is_file() {
        return Err(Error::NotFound(file));
    }

    config
        .init::<B>(device)
        .load_file(stem.to_path_buf(), &CompactRecorder::new(), device)
        .map_err(|e| Error::Model(format!("Failed to load checkpoint {:?}: {:?}", file, e)))
}
