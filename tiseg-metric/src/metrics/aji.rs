//! Aggregated Jaccard Index, per image.

use crate::{
    classwise::{ClassCase, ClasswiseView},
    error::MetricResult,
    instances::InstanceSet,
    map::{ensure_aligned, ensure_same_shape, foreground, LabelMap},
    matching::{match_aji, AjiStats},
    metrics::partial::AjiPartial,
    overlap::PairwiseOverlap,
};

/// Denominator smoothing used when pairing by IoU.
pub const AJI_EPSILON: f64 = 1.0e-6;

/// Binary AJI pre-eval: all foreground instances are matched together.
pub fn pre_eval_bin_aji(pred: &LabelMap, gt: &LabelMap) -> MetricResult<AjiStats> {
    ensure_same_shape("prediction vs ground truth instance maps", gt, pred)?;
    let pred = InstanceSet::from_raw(pred);
    let gt = InstanceSet::from_raw(gt);
    Ok(binary_aji(&pred, &gt, AJI_EPSILON))
}

/// Class-wise AJI pre-eval.
///
/// Instances are bucketed by their majority semantic class and matched only
/// within their bucket. Instances that fall in the background bucket or in a
/// class present on one side only add their area to that class's union.
pub fn pre_eval_aji(
    pred_instances: &LabelMap,
    gt_instances: &LabelMap,
    pred_semantic: &LabelMap,
    gt_semantic: &LabelMap,
    num_classes: usize,
) -> MetricResult<AjiPartial> {
    ensure_aligned(pred_instances, gt_instances, pred_semantic, gt_semantic)?;
    let pred = InstanceSet::from_raw(pred_instances);
    let gt = InstanceSet::from_raw(gt_instances);
    let view = ClasswiseView::new(&pred, &gt, pred_semantic, gt_semantic, num_classes)?;
    Ok(classwise_aji(&view, AJI_EPSILON))
}

/// AJI of a single image over foreground instances.
pub fn binary_aggregated_jaccard_index(pred: &LabelMap, gt: &LabelMap) -> MetricResult<f64> {
    aggregated_jaccard_index(pred, gt, &foreground(pred), &foreground(gt), 2, true)
}

/// AJI of a single image summed over classes.
///
/// Returns 0 when the summed intersection or union is 0.
pub fn aggregated_jaccard_index(
    pred_instances: &LabelMap,
    gt_instances: &LabelMap,
    pred_semantic: &LabelMap,
    gt_semantic: &LabelMap,
    num_classes: usize,
    reduce_zero_class: bool,
) -> MetricResult<f64> {
    let partial = pre_eval_aji(
        pred_instances,
        gt_instances,
        pred_semantic,
        gt_semantic,
        num_classes,
    )?;

    let skip = usize::from(reduce_zero_class);
    let intersection: f64 = partial.intersection.iter().skip(skip).sum();
    let union: f64 = partial.union.iter().skip(skip).sum();

    if intersection == 0.0 || union == 0.0 {
        return Ok(0.0);
    }
    Ok(intersection / union)
}

pub(crate) fn binary_aji(pred: &InstanceSet, gt: &InstanceSet, epsilon: f64) -> AjiStats {
    match_aji(&PairwiseOverlap::between(gt, pred), epsilon)
}

pub(crate) fn classwise_aji(view: &ClasswiseView<'_>, epsilon: f64) -> AjiPartial {
    let mut partial = AjiPartial::zeros(view.num_classes());

    for class in 0..view.num_classes() {
        match view.class_case(class) {
            ClassCase::Absent => {}
            ClassCase::Background { pred_area, gt_area } => {
                partial.union[class] += pred_area + gt_area;
            }
            ClassCase::PredOnly { area } | ClassCase::GtOnly { area } => {
                partial.union[class] += area;
            }
            ClassCase::Both(overlap) => {
                let stats = match_aji(&overlap, epsilon);
                partial.intersection[class] += stats.intersection;
                partial.union[class] += stats.union;
            }
        }
    }

    partial
}
