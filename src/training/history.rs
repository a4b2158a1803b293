//! Per-epoch logs and the training history written after `fit`

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::error::Result;

/// Metrics for a single epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLogs {
    /// One-based epoch number
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Whether the checkpoint callback wrote the model this epoch
    pub checkpointed: bool,
    pub duration_secs: f64,
}

/// Where the fit loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    NotStarted,
    /// One-based epoch currently running
    Epoch { current: usize, total: usize },
    Completed,
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingPhase::NotStarted => write!(f, "not started"),
            TrainingPhase::Epoch { current, total } => write!(f, "epoch {current}/{total}"),
            TrainingPhase::Completed => write!(f, "completed"),
        }
    }
}

/// All epoch logs of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub started_at: String,
    pub epochs: Vec<EpochLogs>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            epochs: Vec::new(),
        }
    }

    pub fn push(&mut self, logs: EpochLogs) {
        self.epochs.push(logs);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Epoch with the lowest validation loss (first one on ties)
    pub fn best_epoch(&self) -> Option<&EpochLogs> {
        self.epochs.iter().fold(None, |best: Option<&EpochLogs>, e| match best {
            Some(b) if b.val_loss <= e.val_loss || e.val_loss.is_nan() => Some(b),
            _ if e.val_loss.is_nan() => best,
            _ => Some(e),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("Training history saved to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
