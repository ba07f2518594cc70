//! Batched tensor input for the instance metrics.

use burn::{prelude::*, tensor::backend::Backend};
use derive_new::new;

use crate::{error::MetricResult, evaluator::EvalSample, map::label_maps_from_batch};

/// Instance metric input.
#[derive(new, Debug, Clone)]
pub struct InstanceMetricInput<B: Backend> {
    /// Predicted instance ids with shape `[batch_size, height, width]`.
    pub pred_instances: Tensor<B, 3, Int>,
    /// Ground-truth instance ids with shape `[batch_size, height, width]`.
    pub gt_instances: Tensor<B, 3, Int>,
    /// Predicted class ids with shape `[batch_size, height, width]`.
    pub pred_semantic: Tensor<B, 3, Int>,
    /// Ground-truth class ids with shape `[batch_size, height, width]`.
    pub gt_semantic: Tensor<B, 3, Int>,
}

impl<B: Backend> InstanceMetricInput<B> {
    /// Copies the batch to the host, one sample per item.
    pub fn to_samples(&self) -> MetricResult<Vec<EvalSample>> {
        let pred_instances = label_maps_from_batch(self.pred_instances.clone())?;
        let gt_instances = label_maps_from_batch(self.gt_instances.clone())?;
        let pred_semantic = label_maps_from_batch(self.pred_semantic.clone())?;
        let gt_semantic = label_maps_from_batch(self.gt_semantic.clone())?;

        Ok(pred_instances
            .into_iter()
            .zip(gt_instances)
            .zip(pred_semantic.into_iter().zip(gt_semantic))
            .map(|((pred_inst, gt_inst), (pred_sem, gt_sem))| {
                EvalSample::new(pred_inst, gt_inst, pred_sem, gt_sem)
            })
            .collect())
    }
}
