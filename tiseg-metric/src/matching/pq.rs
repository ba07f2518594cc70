//! One-to-one pairing for Panoptic Quality.

use serde::{Deserialize, Serialize};

use crate::{
    config::validate_match_iou,
    error::MetricResult,
    matching::assignment::maximum_iou_assignment,
    overlap::PairwiseOverlap,
};

/// Added to the true-positive count when computing SQ.
pub const SQ_EPSILON: f64 = 1.0e-6;

/// Detection counts and summed matched IoU of one PQ pairing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PqStats {
    /// Number of valid pairs.
    pub true_positives: usize,
    /// Predictions without a valid pair.
    pub false_positives: usize,
    /// Ground-truth instances without a valid pair.
    pub false_negatives: usize,
    /// Sum of IoU over valid pairs.
    pub iou_sum: f64,
}

impl PqStats {
    /// Detection quality, NaN when there is nothing to detect.
    #[must_use]
    pub fn dq(&self) -> f64 {
        detection_quality(
            self.true_positives as f64,
            self.false_positives as f64,
            self.false_negatives as f64,
        )
    }

    /// Segmentation quality.
    #[must_use]
    pub fn sq(&self) -> f64 {
        segmentation_quality(self.iou_sum, self.true_positives as f64)
    }

    /// Panoptic quality, `dq * sq`.
    #[must_use]
    pub fn pq(&self) -> f64 {
        self.dq() * self.sq()
    }
}

/// `tp / (tp + 0.5 * fp + 0.5 * fn)`.
#[must_use]
pub fn detection_quality(tp: f64, fp: f64, fn_: f64) -> f64 {
    tp / (tp + 0.5 * fp + 0.5 * fn_)
}

/// `iou_sum / (tp + 1e-6)`. Unpaired instances carry no IoU, so they do not
/// affect it.
#[must_use]
pub fn segmentation_quality(iou_sum: f64, tp: f64) -> f64 {
    iou_sum / (tp + SQ_EPSILON)
}

/// Pairs instances one-to-one and counts TP/FP/FN.
///
/// With `match_iou >= 0.5` any pair with IoU above the threshold is unique on
/// both sides, so thresholding alone gives the pairing. Below 0.5 uniqueness
/// does not hold and the pairing maximizing the total IoU is solved for, then
/// pairs at or below the threshold are dropped.
///
/// # Errors
///
/// Returns `Err(MetricError::InvalidThreshold)` for a negative or NaN threshold.
pub fn match_pq(overlap: &PairwiseOverlap, match_iou: f64) -> MetricResult<PqStats> {
    validate_match_iou(match_iou)?;

    let iou = overlap.iou();
    let paired: Vec<f64> = if match_iou >= 0.5 {
        iou.iter().copied().filter(|&value| value > match_iou).collect()
    } else {
        maximum_iou_assignment(&iou)?
            .into_iter()
            .map(|(row, col)| iou[[row, col]])
            .filter(|&value| value > match_iou)
            .collect()
    };

    let true_positives = paired.len();
    Ok(PqStats {
        true_positives,
        false_positives: overlap.num_pred() - true_positives,
        false_negatives: overlap.num_gt() - true_positives,
        iou_sum: paired.iter().sum(),
    })
}
