//! Metrics for binary classification
//!
//! - Running loss/accuracy accumulation across batches (epoch logs)
//! - A 2x2 confusion matrix with precision, recall and F1 for the
//!   positive class

use serde::{Deserialize, Serialize};

/// Decision threshold applied to predicted probabilities
pub const THRESHOLD: f32 = 0.5;

/// Accumulates sample-weighted loss and accuracy over an epoch
#[derive(Debug, Clone, Default)]
pub struct RunningMetrics {
    loss_sum: f64,
    correct: usize,
    total: usize,
}

impl RunningMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch. `batch_loss` is the mean loss over the batch.
    pub fn update(&mut self, batch_loss: f64, batch_correct: usize, batch_size: usize) {
        self.loss_sum += batch_loss * batch_size as f64;
        self.correct += batch_correct;
        self.total += batch_size;
    }

    /// Mean loss per sample
    pub fn loss(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.loss_sum / self.total as f64
        }
    }

    /// Fraction of samples classified correctly, in [0, 1]
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn samples(&self) -> usize {
        self.total
    }
}

/// Confusion matrix for a binary classifier (positive class = label 1)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryConfusion {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl BinaryConfusion {
    /// Build from predicted probabilities and ground-truth labels
    pub fn from_probabilities(probabilities: &[f32], labels: &[usize]) -> Self {
        let mut cm = Self::default();
        for (&p, &label) in probabilities.iter().zip(labels.iter()) {
            cm.add(label, usize::from(p > THRESHOLD));
        }
        cm
    }

    /// Add a single (actual, predicted) pair
    pub fn add(&mut self, actual: usize, predicted: usize) {
        match (actual, predicted) {
            (1, 1) => self.true_positives += 1,
            (0, 1) => self.false_positives += 1,
            (0, 0) => self.true_negatives += 1,
            (1, 0) => self.false_negatives += 1,
            _ => {}
        }
    }

    pub fn merge(&mut self, other: &BinaryConfusion) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.true_negatives += other.true_negatives;
        self.false_negatives += other.false_negatives;
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            0.0
        }
    }

    /// Render as a small table with the given class names (negative, positive)
    pub fn display(&self, class_names: &[String]) -> String {
        let neg = class_names.first().map(String::as_str).unwrap_or("0");
        let pos = class_names.get(1).map(String::as_str).unwrap_or("1");
        let mut output = String::new();
        output.push_str(&format!("{:>12} {:>10} {:>10}\n", "actual\\pred", neg, pos));
        output.push_str(&format!(
            "{:>12} {:>10} {:>10}\n",
            neg, self.true_negatives, self.false_positives
        ));
        output.push_str(&format!(
            "{:>12} {:>10} {:>10}\n",
            pos, self.false_negatives, self.true_positives
        ));
        output
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
