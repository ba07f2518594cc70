//! Panoptic Quality, per image.

use serde::{Deserialize, Serialize};

use crate::{
    classwise::{ClassCase, ClasswiseView},
    config::validate_match_iou,
    error::MetricResult,
    instances::InstanceSet,
    map::{ensure_aligned, ensure_same_shape, LabelMap},
    matching::{match_pq, pq::detection_quality, pq::segmentation_quality, PqStats},
    metrics::partial::PqPartial,
    overlap::PairwiseOverlap,
};

/// Detection, segmentation and panoptic quality of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    /// Detection quality, an F1 score over instances.
    pub dq: f64,
    /// Segmentation quality, the mean IoU of matched pairs.
    pub sq: f64,
    /// `dq * sq`.
    pub pq: f64,
}

impl QualityScores {
    /// Scores from summed counts.
    #[must_use]
    pub fn from_counts(tp: f64, fp: f64, fn_: f64, iou_sum: f64) -> Self {
        let dq = detection_quality(tp, fp, fn_);
        let sq = segmentation_quality(iou_sum, tp);
        Self { dq, sq, pq: dq * sq }
    }
}

/// Binary PQ pre-eval over all foreground instances.
pub fn pre_eval_bin_pq(pred: &LabelMap, gt: &LabelMap, match_iou: f64) -> MetricResult<PqStats> {
    ensure_same_shape("prediction vs ground truth instance maps", gt, pred)?;
    let pred = InstanceSet::from_raw(pred);
    let gt = InstanceSet::from_raw(gt);
    binary_pq(&pred, &gt, match_iou)
}

/// Class-wise PQ pre-eval.
///
/// Classes present on both sides are matched like the binary case. The
/// background bucket and one-sided classes add the pixel area of their
/// instances to FP (prediction side) or FN (ground-truth side).
pub fn pre_eval_pq(
    pred_instances: &LabelMap,
    gt_instances: &LabelMap,
    pred_semantic: &LabelMap,
    gt_semantic: &LabelMap,
    num_classes: usize,
    match_iou: f64,
) -> MetricResult<PqPartial> {
    validate_match_iou(match_iou)?;
    ensure_aligned(pred_instances, gt_instances, pred_semantic, gt_semantic)?;
    let pred = InstanceSet::from_raw(pred_instances);
    let gt = InstanceSet::from_raw(gt_instances);
    let view = ClasswiseView::new(&pred, &gt, pred_semantic, gt_semantic, num_classes)?;
    classwise_pq(&view, match_iou)
}

/// PQ of a single image over foreground instances.
pub fn binary_panoptic_quality(
    pred: &LabelMap,
    gt: &LabelMap,
    match_iou: f64,
) -> MetricResult<QualityScores> {
    let stats = pre_eval_bin_pq(pred, gt, match_iou)?;
    Ok(QualityScores {
        dq: stats.dq(),
        sq: stats.sq(),
        pq: stats.pq(),
    })
}

/// PQ of a single image with counts summed over classes.
pub fn panoptic_quality(
    pred_instances: &LabelMap,
    gt_instances: &LabelMap,
    pred_semantic: &LabelMap,
    gt_semantic: &LabelMap,
    num_classes: usize,
    match_iou: f64,
    reduce_zero_class: bool,
) -> MetricResult<QualityScores> {
    let partial = pre_eval_pq(
        pred_instances,
        gt_instances,
        pred_semantic,
        gt_semantic,
        num_classes,
        match_iou,
    )?;

    let skip = usize::from(reduce_zero_class);
    let sum = |values: &[f64]| values.iter().skip(skip).sum::<f64>();
    Ok(QualityScores::from_counts(
        sum(&partial.true_positives),
        sum(&partial.false_positives),
        sum(&partial.false_negatives),
        sum(&partial.iou_sum),
    ))
}

pub(crate) fn binary_pq(
    pred: &InstanceSet,
    gt: &InstanceSet,
    match_iou: f64,
) -> MetricResult<PqStats> {
    match_pq(&PairwiseOverlap::between(gt, pred), match_iou)
}

pub(crate) fn classwise_pq(view: &ClasswiseView<'_>, match_iou: f64) -> MetricResult<PqPartial> {
    let mut partial = PqPartial::zeros(view.num_classes());

    for class in 0..view.num_classes() {
        match view.class_case(class) {
            ClassCase::Absent => {}
            ClassCase::Background { pred_area, gt_area } => {
                partial.false_positives[class] += pred_area;
                partial.false_negatives[class] += gt_area;
            }
            ClassCase::PredOnly { area } => partial.false_positives[class] += area,
            ClassCase::GtOnly { area } => partial.false_negatives[class] += area,
            ClassCase::Both(overlap) => {
                partial.add(class, &match_pq(&overlap, match_iou)?);
            }
        }
    }

    Ok(partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::MetricError, map::foreground, metrics::aggregator::pre_eval_to_pq};
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_one_sided_class_counts_pixels() {
        let pred_inst = array![[1, 1, 1, 0]];
        let pred_sem = array![[2, 2, 2, 0]];
        let gt_inst = LabelMap::zeros((1, 4));
        let gt_sem = LabelMap::zeros((1, 4));

        let partial = pre_eval_pq(&pred_inst, &gt_inst, &pred_sem, &gt_sem, 3, 0.5).unwrap();
        assert_eq!(partial.false_positives, vec![0.0, 0.0, 3.0]);
        assert_eq!(partial.true_positives, vec![0.0; 3]);
    }

    #[test]
    fn test_background_bucket_counts_pixels() {
        // pred 3 and gt 2 are mostly semantic background
        let pred_inst = array![[1, 1, 0, 2, 2, 0, 3, 3, 3]];
        let pred_sem = array![[1, 1, 0, 1, 1, 0, 0, 0, 0]];
        let gt_inst = array![[1, 1, 0, 2, 2, 2, 2, 0, 0]];
        let gt_sem = array![[1, 1, 0, 0, 0, 0, 0, 0, 0]];

        let partial = pre_eval_pq(&pred_inst, &gt_inst, &pred_sem, &gt_sem, 2, 0.5).unwrap();
        assert_eq!(partial.false_positives, vec![3.0, 1.0]);
        assert_eq!(partial.false_negatives, vec![4.0, 0.0]);
        assert_eq!(partial.true_positives, vec![0.0, 1.0]);

        let class_one = QualityScores::from_counts(1.0, 1.0, 0.0, partial.iou_sum[1]);
        let results = vec![partial];

        let report = pre_eval_to_pq(&results, None, true).unwrap();
        assert_relative_eq!(report.scalar("mPQ").unwrap(), class_one.pq);
        assert_relative_eq!(report.per_class("PQ").unwrap()[0], 0.0);

        let report = pre_eval_to_pq(&results, None, false).unwrap();
        assert_relative_eq!(report.scalar("mPQ").unwrap(), class_one.pq / 2.0);
    }

    #[test]
    fn test_matched_class_counts_instances() {
        let inst = array![[1, 1, 0, 2], [1, 1, 0, 2]];
        let sem = array![[1, 1, 0, 2], [1, 1, 0, 2]];

        let partial = pre_eval_pq(&inst, &inst, &sem, &sem, 3, 0.5).unwrap();
        assert_eq!(partial.true_positives, vec![0.0, 1.0, 1.0]);
        assert_relative_eq!(partial.iou_sum[1], 1.0);
        assert_relative_eq!(partial.iou_sum[2], 1.0);
    }

    #[test]
    fn test_single_image_scores() {
        let gt = array![[1, 1, 0, 2, 2]];
        let pred = array![[1, 1, 0, 0, 0]];

        let scores = binary_panoptic_quality(&pred, &gt, 0.5).unwrap();
        assert_relative_eq!(scores.dq, 1.0 / 1.5);
        assert_relative_eq!(scores.sq, 1.0 / (1.0 + 1e-6));
        assert_relative_eq!(scores.pq, scores.dq * scores.sq);

        let both = panoptic_quality(&pred, &gt, &foreground(&pred), &foreground(&gt), 2, 0.5, true)
            .unwrap();
        assert_relative_eq!(both.pq, scores.pq);
    }

    #[test]
    fn test_match_threshold_is_forwarded() {
        // IoU 0.5 only pairs below the default threshold
        let gt = array![[1, 1, 1, 1]];
        let pred = array![[1, 1, 0, 0]];
        let (pred_sem, gt_sem) = (foreground(&pred), foreground(&gt));

        let strict = panoptic_quality(&pred, &gt, &pred_sem, &gt_sem, 2, 0.5, true).unwrap();
        let loose = panoptic_quality(&pred, &gt, &pred_sem, &gt_sem, 2, 0.3, true).unwrap();
        assert_eq!(strict.dq, 0.0);
        assert_relative_eq!(loose.dq, 1.0);
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let map = array![[1]];
        assert!(matches!(
            pre_eval_pq(&map, &map, &map, &map, 2, f64::NAN),
            Err(MetricError::InvalidThreshold { .. })
        ));
    }
}
