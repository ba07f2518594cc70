//! Instance metrics for burn's training loop.

use std::marker::PhantomData;

use burn::{
    tensor::backend::Backend,
    train::metric::{Metric, MetricEntry, MetricMetadata, Numeric},
};

use crate::{
    config::{EvalConfig, MetricKind},
    error::MetricResult,
    evaluator::InstanceEvaluator,
    metrics::input::InstanceMetricInput,
};

/// Running dataset score of one instance metric over validation batches.
///
/// Reports the headline score of its kind (`bAji`, `mAji`, `bPQ` or `mPQ`),
/// recomputed from all partials seen since the last `clear`.
#[derive(Debug, Clone)]
pub struct InstanceMetric<B: Backend> {
    kind: MetricKind,
    evaluator: InstanceEvaluator,
    _b: PhantomData<B>,
}

impl<B: Backend> InstanceMetric<B> {
    /// Metric `kind` evaluated with the remaining settings of `config`.
    pub fn new(kind: MetricKind, config: &EvalConfig) -> MetricResult<Self> {
        let config = config.clone().with_metrics(vec![kind.clone()]);
        Ok(Self {
            kind,
            evaluator: InstanceEvaluator::new(config)?,
            _b: PhantomData,
        })
    }

    /// Adds a batch. A batch with any failing image leaves the state untouched.
    fn update_stats(&mut self, item: &InstanceMetricInput<B>) -> MetricResult<()> {
        let results = item
            .to_samples()?
            .iter()
            .map(|sample| self.evaluator.pre_eval(sample))
            .collect::<MetricResult<Vec<_>>>()?;

        for image in results {
            self.evaluator.accumulate(image)?;
        }
        Ok(())
    }

    fn current_value(&self) -> f64 {
        if self.evaluator.num_images() == 0 {
            return 0.0;
        }
        self.evaluator
            .finalize()
            .ok()
            .and_then(|report| report.scalar(self.kind.headline_key()))
            .unwrap_or(0.0)
    }
}

impl<B: Backend> Metric for InstanceMetric<B> {
    type Input = InstanceMetricInput<B>;

    fn name(&self) -> String {
        self.kind.headline_key().to_string()
    }

    fn update(&mut self, item: &Self::Input, _metadata: &MetricMetadata) -> MetricEntry {
        if let Err(err) = self.update_stats(item) {
            tracing::warn!(metric = %self.name(), %err, "skipping batch");
        }
        let value = self.current_value();
        MetricEntry::new(self.name(), format!("{value:.5}"), format!("{value:.5}"))
    }

    fn clear(&mut self) {
        self.evaluator.reset();
    }
}

impl<B: Backend> Numeric for InstanceMetric<B> {
    fn value(&self) -> f64 {
        self.current_value()
    }
}
