//! Training module
//!
//! - `supervised`: the fit loop
//! - `checkpoint`: best-only model checkpointing on validation loss
//! - `history`: per-epoch logs written after training
//! - `evaluate`: loss/accuracy of a model on a dataset or of a saved
//!   checkpoint on the test split

pub mod checkpoint;
pub mod evaluate;
pub mod history;
pub mod supervised;

pub use checkpoint::{load_model, CheckpointInfo, ModelCheckpoint};
pub use evaluate::{evaluate, evaluate_model, EvalReport};
pub use history::{EpochLogs, TrainingHistory, TrainingPhase};
pub use supervised::{fit, FitSummary};
