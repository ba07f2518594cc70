//! Reduction of per-image partials into dataset scores.
//!
//! Sums are computed so that their result does not depend on the order the
//! partials arrived in: the addends of every cell are sorted before a
//! compensated summation. Parallel and sequential evaluation therefore
//! produce bit-identical reports.

use crate::{
    config::{EvalConfig, MetricKind},
    error::{MetricError, MetricResult},
    matching::{
        pq::{detection_quality, segmentation_quality},
        AjiStats, PqStats,
    },
    metrics::{
        partial::{AjiPartial, PqPartial, PreEvalResult},
        report::MetricsReport,
    },
};

/// Collects the partials of one metric and reduces them on demand.
#[derive(Debug, Clone)]
pub struct MetricAggregator {
    kind: MetricKind,
    num_classes: usize,
    reduce_zero_class: bool,
    nan_to_num: Option<f64>,
    results: Vec<PreEvalResult>,
}

impl MetricAggregator {
    /// Empty aggregator for `kind`, reducing as `config` asks.
    #[must_use]
    pub fn new(kind: MetricKind, config: &EvalConfig) -> Self {
        Self {
            kind,
            num_classes: config.num_classes,
            reduce_zero_class: config.reduce_zero_class,
            nan_to_num: config.nan_to_num,
            results: Vec::new(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &MetricKind {
        &self.kind
    }

    /// Appends the partial of one image.
    ///
    /// # Errors
    ///
    /// Returns `Err(MetricError::PartialMismatch)` if the partial belongs to a
    /// different metric or has a different class count.
    pub fn accumulate(&mut self, result: PreEvalResult) -> MetricResult<()> {
        if result.kind() != self.kind {
            return Err(MetricError::PartialMismatch {
                reason: format!(
                    "{:?} partial given to the {:?} aggregator",
                    result.kind(),
                    self.kind
                ),
            });
        }
        if let Some(num_classes) = result.num_classes() {
            if num_classes != self.num_classes {
                return Err(MetricError::PartialMismatch {
                    reason: format!(
                        "partial has {num_classes} classes, expected {}",
                        self.num_classes
                    ),
                });
            }
        }

        self.results.push(result);
        Ok(())
    }

    /// Number of accumulated images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    /// Reduces everything accumulated so far. The aggregator keeps its
    /// partials, so this can be called repeatedly.
    pub fn finalize(&self) -> MetricResult<MetricsReport> {
        let report = match self.kind {
            MetricKind::BinaryAji => {
                let stats: Vec<AjiStats> = self
                    .results
                    .iter()
                    .filter_map(|r| match r {
                        PreEvalResult::BinaryAji(stats) => Some(*stats),
                        _ => None,
                    })
                    .collect();
                pre_eval_to_bin_aji(&stats, self.nan_to_num)?
            }
            MetricKind::Aji => {
                let partials: Vec<&AjiPartial> = self
                    .results
                    .iter()
                    .filter_map(|r| match r {
                        PreEvalResult::Aji(partial) => Some(partial),
                        _ => None,
                    })
                    .collect();
                reduce_aji(&partials, self.nan_to_num, self.reduce_zero_class)?
            }
            MetricKind::BinaryPq => {
                let stats: Vec<PqStats> = self
                    .results
                    .iter()
                    .filter_map(|r| match r {
                        PreEvalResult::BinaryPq(stats) => Some(*stats),
                        _ => None,
                    })
                    .collect();
                pre_eval_to_bin_pq(&stats, self.nan_to_num)?
            }
            MetricKind::Pq => {
                let partials: Vec<&PqPartial> = self
                    .results
                    .iter()
                    .filter_map(|r| match r {
                        PreEvalResult::Pq(partial) => Some(partial),
                        _ => None,
                    })
                    .collect();
                reduce_pq(&partials, self.nan_to_num, self.reduce_zero_class)?
            }
        };

        if self.nan_to_num.is_none() && report.has_nan() {
            tracing::warn!(
                metric = ?self.kind,
                images = self.len(),
                "finalized scores contain NaN; set nan_to_num to replace them"
            );
        }

        Ok(report)
    }
}

/// `bAji`: summed intersection over summed union.
pub fn pre_eval_to_bin_aji(
    results: &[AjiStats],
    nan_to_num: Option<f64>,
) -> MetricResult<MetricsReport> {
    ensure_non_empty(results.len())?;

    let intersection = stable_sum(results.iter().map(|s| s.intersection));
    let union = stable_sum(results.iter().map(|s| s.union));

    let mut report = MetricsReport::new();
    report.insert_scalar("bAji", intersection / union);
    Ok(finish(report, nan_to_num))
}

/// `Aji` per class and its class mean `mAji`.
pub fn pre_eval_to_aji(
    results: &[AjiPartial],
    nan_to_num: Option<f64>,
    reduce_zero_class: bool,
) -> MetricResult<MetricsReport> {
    let partials: Vec<&AjiPartial> = results.iter().collect();
    reduce_aji(&partials, nan_to_num, reduce_zero_class)
}

/// `bDQ`, `bSQ` and `bPQ` from summed counts.
pub fn pre_eval_to_bin_pq(
    results: &[PqStats],
    nan_to_num: Option<f64>,
) -> MetricResult<MetricsReport> {
    ensure_non_empty(results.len())?;

    let tp = stable_sum(results.iter().map(|s| s.true_positives as f64));
    let fp = stable_sum(results.iter().map(|s| s.false_positives as f64));
    let fn_ = stable_sum(results.iter().map(|s| s.false_negatives as f64));
    let iou_sum = stable_sum(results.iter().map(|s| s.iou_sum));

    let dq = detection_quality(tp, fp, fn_);
    let sq = segmentation_quality(iou_sum, tp);

    let mut report = MetricsReport::new();
    report.insert_scalar("bDQ", dq);
    report.insert_scalar("bSQ", sq);
    report.insert_scalar("bPQ", dq * sq);
    Ok(finish(report, nan_to_num))
}

/// `DQ`, `SQ`, `PQ` per class and their class means `mDQ`, `mSQ`, `mPQ`.
pub fn pre_eval_to_pq(
    results: &[PqPartial],
    nan_to_num: Option<f64>,
    reduce_zero_class: bool,
) -> MetricResult<MetricsReport> {
    let partials: Vec<&PqPartial> = results.iter().collect();
    reduce_pq(&partials, nan_to_num, reduce_zero_class)
}

fn reduce_aji(
    partials: &[&AjiPartial],
    nan_to_num: Option<f64>,
    reduce_zero_class: bool,
) -> MetricResult<MetricsReport> {
    let width = class_width(partials.iter().map(|p| p.num_classes()))?;

    let intersection = column_sums(partials.iter().map(|p| p.intersection.as_slice()), width);
    let union = column_sums(partials.iter().map(|p| p.union.as_slice()), width);
    let aji: Vec<f64> = intersection
        .iter()
        .zip(&union)
        .map(|(i, u)| i / u)
        .collect();

    let mut report = MetricsReport::new();
    report.insert_scalar("mAji", class_mean(&aji, reduce_zero_class));
    report.insert_per_class("Aji", aji);
    Ok(finish(report, nan_to_num))
}

fn reduce_pq(
    partials: &[&PqPartial],
    nan_to_num: Option<f64>,
    reduce_zero_class: bool,
) -> MetricResult<MetricsReport> {
    let width = class_width(partials.iter().map(|p| p.num_classes()))?;

    let tp = column_sums(partials.iter().map(|p| p.true_positives.as_slice()), width);
    let fp = column_sums(partials.iter().map(|p| p.false_positives.as_slice()), width);
    let fn_ = column_sums(partials.iter().map(|p| p.false_negatives.as_slice()), width);
    let iou_sum = column_sums(partials.iter().map(|p| p.iou_sum.as_slice()), width);

    let dq: Vec<f64> = (0..width)
        .map(|c| detection_quality(tp[c], fp[c], fn_[c]))
        .collect();
    let sq: Vec<f64> = (0..width)
        .map(|c| segmentation_quality(iou_sum[c], tp[c]))
        .collect();
    let pq: Vec<f64> = dq.iter().zip(&sq).map(|(d, s)| d * s).collect();

    let mut report = MetricsReport::new();
    report.insert_scalar("mDQ", class_mean(&dq, reduce_zero_class));
    report.insert_scalar("mSQ", class_mean(&sq, reduce_zero_class));
    report.insert_scalar("mPQ", class_mean(&pq, reduce_zero_class));
    report.insert_per_class("DQ", dq);
    report.insert_per_class("SQ", sq);
    report.insert_per_class("PQ", pq);
    Ok(finish(report, nan_to_num))
}

fn finish(mut report: MetricsReport, nan_to_num: Option<f64>) -> MetricsReport {
    if let Some(fill) = nan_to_num {
        report.nan_to_num(fill);
    }
    report
}

fn ensure_non_empty(len: usize) -> MetricResult<()> {
    if len == 0 {
        return Err(MetricError::PartialMismatch {
            reason: "no pre-eval results to reduce".to_string(),
        });
    }
    Ok(())
}

/// The common class count of all partials.
fn class_width(mut widths: impl Iterator<Item = usize>) -> MetricResult<usize> {
    let width = widths.next().ok_or_else(|| MetricError::PartialMismatch {
        reason: "no pre-eval results to reduce".to_string(),
    })?;

    match widths.find(|&other| other != width) {
        Some(other) => Err(MetricError::PartialMismatch {
            reason: format!("partials disagree on class count: {width} vs {other}"),
        }),
        None => Ok(width),
    }
}

fn column_sums<'a>(rows: impl Iterator<Item = &'a [f64]>, width: usize) -> Vec<f64> {
    let mut columns = vec![Vec::new(); width];
    for row in rows {
        for (column, &value) in columns.iter_mut().zip(row) {
            column.push(value);
        }
    }
    columns.into_iter().map(stable_sum).collect()
}

/// Mean over classes, skipping background when `reduce_zero_class` is set.
/// NaN classes propagate.
fn class_mean(values: &[f64], reduce_zero_class: bool) -> f64 {
    let kept = &values[usize::from(reduce_zero_class).min(values.len())..];
    stable_sum(kept.iter().copied()) / kept.len() as f64
}

/// Neumaier-compensated sum over the addends in sorted order.
fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut values: Vec<f64> = values.into_iter().collect();
    values.sort_by(f64::total_cmp);

    let mut sum = 0.0;
    let mut compensation = 0.0;
    for value in values {
        let total = sum + value;
        if f64::abs(sum) >= f64::abs(value) {
            compensation += (sum - total) + value;
        } else {
            compensation += (value - total) + sum;
        }
        sum = total;
    }
    sum + compensation
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> EvalConfig {
        EvalConfig::new(3)
    }

    #[test]
    fn test_binary_aji_sums_before_dividing() {
        let results = [
            AjiStats {
                intersection: 1.0,
                union: 4.0,
            },
            AjiStats {
                intersection: 3.0,
                union: 4.0,
            },
        ];

        let report = pre_eval_to_bin_aji(&results, None).unwrap();
        assert_relative_eq!(report.scalar("bAji").unwrap(), 0.5);
    }

    #[test]
    fn test_classwise_aji_skips_background() {
        let results = [AjiPartial {
            intersection: vec![0.0, 2.0, 1.0],
            union: vec![5.0, 4.0, 4.0],
        }];

        let report = pre_eval_to_aji(&results, None, true).unwrap();
        assert_eq!(report.per_class("Aji").unwrap(), &[0.0, 0.5, 0.25]);
        assert_relative_eq!(report.scalar("mAji").unwrap(), 0.375);

        let report = pre_eval_to_aji(&results, None, false).unwrap();
        assert_relative_eq!(report.scalar("mAji").unwrap(), 0.25);
    }

    #[test]
    fn test_empty_class_propagates_nan_unless_filled() {
        let results = [AjiPartial {
            intersection: vec![0.0, 2.0, 0.0],
            union: vec![0.0, 4.0, 0.0],
        }];

        let report = pre_eval_to_aji(&results, None, true).unwrap();
        assert!(report.per_class("Aji").unwrap()[2].is_nan());
        assert!(report.scalar("mAji").unwrap().is_nan());

        let report = pre_eval_to_aji(&results, Some(0.0), true).unwrap();
        assert_eq!(report.per_class("Aji").unwrap(), &[0.0, 0.5, 0.0]);
        assert_eq!(report.scalar("mAji"), Some(0.0));
    }

    #[test]
    fn test_classwise_pq_keys() {
        let results = [PqPartial {
            true_positives: vec![0.0, 2.0, 1.0],
            false_positives: vec![3.0, 0.0, 1.0],
            false_negatives: vec![1.0, 0.0, 1.0],
            iou_sum: vec![0.0, 1.8, 0.6],
        }];

        let report = pre_eval_to_pq(&results, None, true).unwrap();
        for key in ["DQ", "SQ", "PQ", "mDQ", "mSQ", "mPQ"] {
            assert!(report.get(key).is_some(), "missing {key}");
        }
        let dq = report.per_class("DQ").unwrap();
        assert_relative_eq!(dq[1], 1.0);
        assert_relative_eq!(dq[2], 0.5);
        assert_relative_eq!(report.scalar("mDQ").unwrap(), 0.75);
    }

    #[test]
    fn test_binary_pq_matches_formula() {
        let results = [
            PqStats {
                true_positives: 2,
                false_positives: 1,
                false_negatives: 0,
                iou_sum: 1.5,
            },
            PqStats {
                true_positives: 1,
                false_positives: 0,
                false_negatives: 1,
                iou_sum: 0.9,
            },
        ];

        let report = pre_eval_to_bin_pq(&results, None).unwrap();
        let dq = 3.0 / (3.0 + 0.5 + 0.5);
        let sq = 2.4 / (3.0 + 1e-6);
        assert_relative_eq!(report.scalar("bDQ").unwrap(), dq);
        assert_relative_eq!(report.scalar("bSQ").unwrap(), sq);
        assert_eq!(
            report.scalar("bPQ").unwrap(),
            report.scalar("bDQ").unwrap() * report.scalar("bSQ").unwrap()
        );
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            pre_eval_to_bin_aji(&[], None),
            Err(MetricError::PartialMismatch { .. })
        ));
        assert!(matches!(
            pre_eval_to_pq(&[], None, true),
            Err(MetricError::PartialMismatch { .. })
        ));
    }

    #[test]
    fn test_aggregator_rejects_foreign_partials() {
        let mut aggregator = MetricAggregator::new(MetricKind::Aji, &config());

        let wrong_kind = PreEvalResult::BinaryAji(AjiStats::default());
        assert!(aggregator.accumulate(wrong_kind).is_err());

        let wrong_width = PreEvalResult::Aji(AjiPartial::zeros(2));
        assert!(aggregator.accumulate(wrong_width).is_err());

        aggregator
            .accumulate(PreEvalResult::Aji(AjiPartial::zeros(3)))
            .unwrap();
        assert_eq!(aggregator.len(), 1);

        aggregator.clear();
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_order_does_not_change_the_sum() {
        let values = [0.1, 1e16, 0.2, -1e16, 0.3, 7.0];
        let mut reversed = values;
        reversed.reverse();

        assert_eq!(stable_sum(values), stable_sum(reversed));
        assert_relative_eq!(stable_sum(values), 7.6, epsilon = 1e-9);
    }
}
