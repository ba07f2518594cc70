//! Dataset evaluation driver.
//!
//! [`InstanceEvaluator`] owns one [`MetricAggregator`] per configured metric.
//! `pre_eval` is pure and can run on any thread; `accumulate` must be called
//! from the single collector that owns the evaluator.

use rayon::prelude::*;

use crate::{
    classwise::ClasswiseView,
    config::{EvalConfig, MetricKind},
    error::{MetricError, MetricResult},
    instances::InstanceSet,
    map::{ensure_aligned, foreground, LabelMap},
    metrics::{
        aji::{binary_aji, classwise_aji},
        pq::{binary_pq, classwise_pq},
        MetricAggregator, MetricsReport, PreEvalResult,
    },
};

/// The four maps of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSample {
    pub pred_instances: LabelMap,
    pub gt_instances: LabelMap,
    pub pred_semantic: LabelMap,
    pub gt_semantic: LabelMap,
}

impl EvalSample {
    #[must_use]
    pub const fn new(
        pred_instances: LabelMap,
        gt_instances: LabelMap,
        pred_semantic: LabelMap,
        gt_semantic: LabelMap,
    ) -> Self {
        Self {
            pred_instances,
            gt_instances,
            pred_semantic,
            gt_semantic,
        }
    }

    /// Sample without class information: every instance is foreground class 1.
    #[must_use]
    pub fn binary(pred_instances: LabelMap, gt_instances: LabelMap) -> Self {
        let pred_semantic = foreground(&pred_instances);
        let gt_semantic = foreground(&gt_instances);
        Self::new(pred_instances, gt_instances, pred_semantic, gt_semantic)
    }
}

/// Evaluates images one at a time and reduces them on request.
#[derive(Debug, Clone)]
pub struct InstanceEvaluator {
    config: EvalConfig,
    aggregators: Vec<MetricAggregator>,
}

impl InstanceEvaluator {
    /// Validates `config` and prepares one aggregator per metric.
    pub fn new(config: EvalConfig) -> MetricResult<Self> {
        config.validate()?;

        let aggregators = config
            .metrics
            .iter()
            .map(|kind| MetricAggregator::new(kind.clone(), &config))
            .collect();

        Ok(Self {
            config,
            aggregators,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Number of images accumulated so far.
    #[must_use]
    pub fn num_images(&self) -> usize {
        self.aggregators.first().map_or(0, MetricAggregator::len)
    }

    /// Computes the partials of one image, in the order of `config.metrics`.
    ///
    /// Instance maps are relabeled once and shared by all metrics.
    pub fn pre_eval(&self, sample: &EvalSample) -> MetricResult<Vec<PreEvalResult>> {
        ensure_aligned(
            &sample.pred_instances,
            &sample.gt_instances,
            &sample.pred_semantic,
            &sample.gt_semantic,
        )?;

        let pred = InstanceSet::from_raw(&sample.pred_instances);
        let gt = InstanceSet::from_raw(&sample.gt_instances);
        pred.ensure_at_most(self.config.max_instances, "prediction")?;
        gt.ensure_at_most(self.config.max_instances, "ground truth")?;

        tracing::debug!(
            pred_instances = pred.len(),
            gt_instances = gt.len(),
            "pre-evaluating image"
        );

        let view = if self.config.needs_classes() {
            Some(ClasswiseView::new(
                &pred,
                &gt,
                &sample.pred_semantic,
                &sample.gt_semantic,
                self.config.num_classes,
            )?)
        } else {
            None
        };
        let classwise = || {
            view.as_ref().ok_or_else(|| MetricError::InvalidConfiguration {
                reason: "class-wise metric without semantic partition".to_string(),
            })
        };

        self.config
            .metrics
            .iter()
            .map(|kind| match kind {
                MetricKind::BinaryAji => Ok(PreEvalResult::BinaryAji(binary_aji(
                    &pred,
                    &gt,
                    self.config.epsilon,
                ))),
                MetricKind::Aji => Ok(PreEvalResult::Aji(classwise_aji(
                    classwise()?,
                    self.config.epsilon,
                ))),
                MetricKind::BinaryPq => Ok(PreEvalResult::BinaryPq(binary_pq(
                    &pred,
                    &gt,
                    self.config.match_iou,
                )?)),
                MetricKind::Pq => Ok(PreEvalResult::Pq(classwise_pq(
                    classwise()?,
                    self.config.match_iou,
                )?)),
            })
            .collect()
    }

    /// Hands the partials of one image to the aggregators.
    pub fn accumulate(&mut self, results: Vec<PreEvalResult>) -> MetricResult<()> {
        if results.len() != self.aggregators.len() {
            return Err(MetricError::PartialMismatch {
                reason: format!(
                    "expected {} partials per image, got {}",
                    self.aggregators.len(),
                    results.len()
                ),
            });
        }

        for (aggregator, result) in self.aggregators.iter_mut().zip(results) {
            aggregator.accumulate(result)?;
        }
        Ok(())
    }

    /// `pre_eval` followed by `accumulate`.
    pub fn process(&mut self, sample: &EvalSample) -> MetricResult<()> {
        let results = self.pre_eval(sample)?;
        self.accumulate(results)
    }

    /// Merged report of all metrics.
    pub fn finalize(&self) -> MetricResult<MetricsReport> {
        let mut report = MetricsReport::new();
        for aggregator in &self.aggregators {
            report.merge(aggregator.finalize()?);
        }

        tracing::info!(
            images = self.num_images(),
            metrics = report.len(),
            "evaluation finalized"
        );
        Ok(report)
    }

    /// Drops all accumulated partials.
    pub fn reset(&mut self) {
        for aggregator in &mut self.aggregators {
            aggregator.clear();
        }
    }
}

/// Evaluates `samples` in parallel and reduces them.
///
/// The result equals sequential evaluation in any order.
pub fn evaluate_dataset(config: &EvalConfig, samples: &[EvalSample]) -> MetricResult<MetricsReport> {
    let mut evaluator = InstanceEvaluator::new(config.clone())?;

    let results: Vec<Vec<PreEvalResult>> = samples
        .par_iter()
        .map(|sample| evaluator.pre_eval(sample))
        .collect::<MetricResult<_>>()?;

    for image in results {
        evaluator.accumulate(image)?;
    }
    evaluator.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn config(metrics: Vec<MetricKind>) -> EvalConfig {
        EvalConfig::new(2).with_metrics(metrics)
    }

    #[test]
    fn test_partials_follow_config_order() {
        let evaluator =
            InstanceEvaluator::new(config(vec![MetricKind::Pq, MetricKind::BinaryAji])).unwrap();
        let map = array![[1, 1, 0], [0, 0, 2]];

        let results = evaluator.pre_eval(&EvalSample::binary(map.clone(), map)).unwrap();
        assert_eq!(results[0].kind(), MetricKind::Pq);
        assert_eq!(results[1].kind(), MetricKind::BinaryAji);
    }

    #[test]
    fn test_instance_cap_is_enforced() {
        let cfg = config(vec![MetricKind::BinaryAji]).with_max_instances(Some(1));
        let evaluator = InstanceEvaluator::new(cfg).unwrap();
        let map = array![[1, 0, 2]];

        match evaluator.pre_eval(&EvalSample::binary(map.clone(), map)) {
            Err(MetricError::TooManyInstances { count, cap, .. }) => {
                assert_eq!(count, 2);
                assert_eq!(cap, 1);
            }
            other => panic!("Expected TooManyInstances, got {other:?}"),
        }
    }

    #[test]
    fn test_classwise_partials_ignore_binary_metrics() {
        // third truth pixel is labeled background by its semantic map
        let inst = array![[1, 1, 1, 0]];
        let sem = array![[1, 1, 0, 0]];
        let sample = EvalSample::new(inst.clone(), inst, sem.clone(), sem);

        let classwise_only = InstanceEvaluator::new(config(vec![MetricKind::Aji, MetricKind::Pq]))
            .unwrap()
            .pre_eval(&sample)
            .unwrap();
        let all = InstanceEvaluator::new(config(MetricKind::ALL.to_vec()))
            .unwrap()
            .pre_eval(&sample)
            .unwrap();

        assert_eq!(all[1], classwise_only[0]);
        assert_eq!(all[3], classwise_only[1]);
        match &all[0] {
            PreEvalResult::BinaryAji(stats) => {
                assert_relative_eq!(stats.intersection, 3.0);
                assert_relative_eq!(stats.union, 3.0);
            }
            other => panic!("Expected BinaryAji, got {other:?}"),
        }
    }

    #[test]
    fn test_process_then_finalize_and_reset() {
        let mut evaluator = InstanceEvaluator::new(config(MetricKind::ALL.to_vec())).unwrap();
        let map = array![[1, 1, 0, 2], [1, 1, 0, 2]];

        evaluator
            .process(&EvalSample::binary(map.clone(), map))
            .unwrap();
        assert_eq!(evaluator.num_images(), 1);

        let report = evaluator.finalize().unwrap();
        assert_relative_eq!(report.scalar("bAji").unwrap(), 1.0);
        assert_relative_eq!(report.scalar("mAji").unwrap(), 1.0);
        assert_relative_eq!(report.scalar("bDQ").unwrap(), 1.0);
        assert_relative_eq!(report.scalar("mDQ").unwrap(), 1.0);

        evaluator.reset();
        assert_eq!(evaluator.num_images(), 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        // background cells are 0/0; fill them so the reports compare equal
        let cfg = config(MetricKind::ALL.to_vec()).with_nan_to_num(Some(-1.0));
        let samples: Vec<EvalSample> = (0..8u32)
            .map(|shift| {
                let mut gt = LabelMap::zeros((6, 6));
                let mut pred = LabelMap::zeros((6, 6));
                gt.slice_mut(ndarray::s![0..3, 0..3]).fill(1);
                gt.slice_mut(ndarray::s![4..6, 2..6]).fill(2);
                let offset = (shift % 3) as usize;
                pred.slice_mut(ndarray::s![offset..offset + 3, 0..3]).fill(1);
                EvalSample::binary(pred, gt)
            })
            .collect();

        let parallel = evaluate_dataset(&cfg, &samples).unwrap();

        let mut evaluator = InstanceEvaluator::new(cfg).unwrap();
        for sample in samples.iter().rev() {
            evaluator.process(sample).unwrap();
        }
        assert_eq!(parallel, evaluator.finalize().unwrap());
    }
}
