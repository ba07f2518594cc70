//! Evaluation configuration.
//!
//! The configuration is an explicit value handed to every per-image scoring
//! call and to the final reduction. It derives burn's `Config`, so it can be
//! saved to and loaded from JSON next to the training configuration.

use burn::prelude::*;

use crate::error::{MetricError, MetricResult};

/// The instance metrics that can be computed per image.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum MetricKind {
    /// Aggregated Jaccard Index over foreground instances, ignoring classes.
    BinaryAji,
    /// Class-wise Aggregated Jaccard Index.
    Aji,
    /// Panoptic Quality over foreground instances, ignoring classes.
    BinaryPq,
    /// Class-wise Panoptic Quality.
    Pq,
}

impl MetricKind {
    /// All metric kinds, in report order.
    pub const ALL: [Self; 4] = [Self::BinaryAji, Self::Aji, Self::BinaryPq, Self::Pq];

    /// Returns `true` for the kinds that need semantic maps.
    #[must_use]
    pub const fn is_classwise(&self) -> bool {
        matches!(self, Self::Aji | Self::Pq)
    }

    /// The report key holding the headline score of this metric.
    #[must_use]
    pub const fn headline_key(&self) -> &'static str {
        match self {
            Self::BinaryAji => "bAji",
            Self::Aji => "mAji",
            Self::BinaryPq => "bPQ",
            Self::Pq => "mPQ",
        }
    }
}

/// Configuration for a dataset evaluation pass.
#[derive(Config, Debug)]
pub struct EvalConfig {
    /// Number of semantic classes, background included.
    pub num_classes: usize,
    /// Metrics computed for every image.
    #[config(default = "vec![MetricKind::Aji, MetricKind::Pq]")]
    pub metrics: Vec<MetricKind>,
    /// IoU a prediction/truth pair must exceed to count as a PQ match.
    #[config(default = 0.5)]
    pub match_iou: f64,
    /// Added to the union before dividing in AJI pairing.
    #[config(default = 1e-6)]
    pub epsilon: f64,
    /// Exclude the background class from class means.
    #[config(default = true)]
    pub reduce_zero_class: bool,
    /// Replacement for NaN scores after the final division.
    #[config(default = "None")]
    pub nan_to_num: Option<f64>,
    /// Upper bound on instances per image and side.
    #[config(default = "None")]
    pub max_instances: Option<usize>,
}

impl EvalConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricError::InvalidThreshold)` for a negative or NaN
    /// `match_iou` and `Err(MetricError::InvalidConfiguration)` for every other
    /// inconsistent setting.
    pub fn validate(&self) -> MetricResult<()> {
        if self.num_classes < 2 {
            return Err(MetricError::InvalidConfiguration {
                reason: format!(
                    "num_classes must be >= 2 (background + foreground), got {}",
                    self.num_classes
                ),
            });
        }

        validate_match_iou(self.match_iou)?;

        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(MetricError::InvalidConfiguration {
                reason: format!("epsilon must be a positive finite value, got {}", self.epsilon),
            });
        }

        if self.metrics.is_empty() {
            return Err(MetricError::InvalidConfiguration {
                reason: "at least one metric must be selected".to_string(),
            });
        }

        for (index, kind) in self.metrics.iter().enumerate() {
            if self.metrics[..index].contains(kind) {
                return Err(MetricError::InvalidConfiguration {
                    reason: format!("metric {kind:?} is selected twice"),
                });
            }
        }

        if self.max_instances == Some(0) {
            return Err(MetricError::InvalidConfiguration {
                reason: "max_instances must be positive when set".to_string(),
            });
        }

        Ok(())
    }

    /// Returns `true` if any selected metric needs semantic maps.
    #[must_use]
    pub fn needs_classes(&self) -> bool {
        self.metrics.iter().any(MetricKind::is_classwise)
    }
}

/// Rejects a negative or NaN PQ matching threshold.
pub(crate) fn validate_match_iou(match_iou: f64) -> MetricResult<()> {
    if match_iou >= 0.0 && match_iou.is_finite() {
        Ok(())
    } else {
        Err(MetricError::InvalidThreshold { value: match_iou })
    }
}
