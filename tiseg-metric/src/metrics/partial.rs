//! Per-image partial statistics.
//!
//! A partial is produced once per image, never mutated afterwards, and summed
//! by the aggregator. All types serialize, so workers in other processes can
//! ship them to the collector.

use serde::{Deserialize, Serialize};

use crate::{
    config::MetricKind,
    matching::{AjiStats, PqStats},
};

/// Class-wise AJI partial, indexed by semantic class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AjiPartial {
    /// Paired intersection per class.
    pub intersection: Vec<f64>,
    /// Paired union plus unpaired area per class.
    pub union: Vec<f64>,
}

impl AjiPartial {
    /// All-zero partial for `num_classes` classes.
    #[must_use]
    pub fn zeros(num_classes: usize) -> Self {
        Self {
            intersection: vec![0.0; num_classes],
            union: vec![0.0; num_classes],
        }
    }

    /// Number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.intersection.len()
    }
}

/// Class-wise PQ partial, indexed by semantic class.
///
/// Values are `f64` because the background bucket and one-sided classes add
/// pixel areas rather than instance counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PqPartial {
    /// True positives per class.
    pub true_positives: Vec<f64>,
    /// False positives per class.
    pub false_positives: Vec<f64>,
    /// False negatives per class.
    pub false_negatives: Vec<f64>,
    /// Summed matched IoU per class.
    pub iou_sum: Vec<f64>,
}

impl PqPartial {
    /// All-zero partial for `num_classes` classes.
    #[must_use]
    pub fn zeros(num_classes: usize) -> Self {
        Self {
            true_positives: vec![0.0; num_classes],
            false_positives: vec![0.0; num_classes],
            false_negatives: vec![0.0; num_classes],
            iou_sum: vec![0.0; num_classes],
        }
    }

    /// Number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.true_positives.len()
    }

    /// Adds the stats of one class bucket.
    pub fn add(&mut self, class: usize, stats: &PqStats) {
        self.true_positives[class] += stats.true_positives as f64;
        self.false_positives[class] += stats.false_positives as f64;
        self.false_negatives[class] += stats.false_negatives as f64;
        self.iou_sum[class] += stats.iou_sum;
    }
}

/// The pre-eval output of one metric for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreEvalResult {
    /// Binary AJI partial.
    BinaryAji(AjiStats),
    /// Class-wise AJI partial.
    Aji(AjiPartial),
    /// Binary PQ partial.
    BinaryPq(PqStats),
    /// Class-wise PQ partial.
    Pq(PqPartial),
}

impl PreEvalResult {
    /// The metric this result belongs to.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::BinaryAji(_) => MetricKind::BinaryAji,
            Self::Aji(_) => MetricKind::Aji,
            Self::BinaryPq(_) => MetricKind::BinaryPq,
            Self::Pq(_) => MetricKind::Pq,
        }
    }

    /// Class count of a class-wise result, `None` for binary ones.
    #[must_use]
    pub fn num_classes(&self) -> Option<usize> {
        match self {
            Self::Aji(partial) => Some(partial.num_classes()),
            Self::Pq(partial) => Some(partial.num_classes()),
            Self::BinaryAji(_) | Self::BinaryPq(_) => None,
        }
    }
}
