//! Label maps and their conversions.
//!
//! Instance and semantic maps are plain host-side grids. Network outputs
//! arrive as burn integer tensors and are converted here once per image.

use burn::{
    prelude::*,
    tensor::{backend::Backend, Tensor, TensorData},
};
use ndarray::Array2;

use crate::error::{MetricError, MetricResult};

/// A 2-D integer label grid. `0` is background.
pub type LabelMap = Array2<u32>;

/// Fails unless `actual` has the same shape as `expected`.
pub fn ensure_same_shape(context: &str, expected: &LabelMap, actual: &LabelMap) -> MetricResult<()> {
    if expected.dim() == actual.dim() {
        Ok(())
    } else {
        Err(MetricError::ShapeMismatch {
            context: context.to_string(),
            expected: expected.dim(),
            actual: actual.dim(),
        })
    }
}

/// Checks that all four maps of one image share a shape.
pub fn ensure_aligned(
    pred_instances: &LabelMap,
    gt_instances: &LabelMap,
    pred_semantic: &LabelMap,
    gt_semantic: &LabelMap,
) -> MetricResult<()> {
    ensure_same_shape("prediction vs ground truth instance maps", gt_instances, pred_instances)?;
    ensure_same_shape("predicted instance vs semantic map", pred_instances, pred_semantic)?;
    ensure_same_shape("ground-truth instance vs semantic map", gt_instances, gt_semantic)
}

/// Two-class semantic map derived from an instance map: `1` on every instance
/// pixel, `0` elsewhere.
#[must_use]
pub fn foreground(instances: &LabelMap) -> LabelMap {
    instances.mapv(|id| u32::from(id > 0))
}

/// Converts a `[height, width]` integer tensor into a label map.
///
/// # Errors
///
/// Returns `Err(MetricError::TensorConversion)` if a label is negative or does
/// not fit into `u32`.
pub fn label_map_from_tensor<B: Backend>(tensor: Tensor<B, 2, Int>) -> MetricResult<LabelMap> {
    let [height, width] = tensor.dims();
    let values = tensor_labels(tensor.into_data())?;

    Array2::from_shape_vec((height, width), values).map_err(|e| MetricError::TensorConversion {
        reason: e.to_string(),
    })
}

/// Converts a `[batch, height, width]` integer tensor into one label map per item.
pub fn label_maps_from_batch<B: Backend>(tensor: Tensor<B, 3, Int>) -> MetricResult<Vec<LabelMap>> {
    let [batch_size, height, width] = tensor.dims();
    let values = tensor_labels(tensor.into_data())?;
    let plane = height * width;

    (0..batch_size)
        .map(|item| {
            let start = item * plane;
            Array2::from_shape_vec((height, width), values[start..start + plane].to_vec()).map_err(
                |e| MetricError::TensorConversion {
                    reason: e.to_string(),
                },
            )
        })
        .collect()
}

fn tensor_labels(data: TensorData) -> MetricResult<Vec<u32>> {
    data.iter::<i64>()
        .map(|value| {
            u32::try_from(value).map_err(|_| MetricError::TensorConversion {
                reason: format!("label {value} is not a valid non-negative id"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use ndarray::array;

    type TestBackend = NdArray;

    #[test]
    fn test_shape_mismatch_is_reported() {
        let a = LabelMap::zeros((4, 4));
        let b = LabelMap::zeros((4, 5));

        match ensure_same_shape("prediction vs ground truth", &a, &b) {
            Err(MetricError::ShapeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (4, 5));
            }
            other => panic!("Expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_foreground_binarizes_ids() {
        let instances = array![[0, 3, 3], [7, 0, 1]];
        assert_eq!(foreground(&instances), array![[0, 1, 1], [1, 0, 1]]);
    }

    #[test]
    fn test_tensor_conversion_keeps_layout() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2, Int>::from_ints([[0, 1, 2], [3, 4, 5]], &device);

        let map = label_map_from_tensor(tensor).unwrap();
        assert_eq!(map, array![[0, 1, 2], [3, 4, 5]]);
    }

    #[test]
    fn test_batch_conversion_splits_items() {
        let device = Default::default();
        let tensor =
            Tensor::<TestBackend, 3, Int>::from_ints([[[1, 0], [0, 1]], [[2, 2], [0, 0]]], &device);

        let maps = label_maps_from_batch(tensor).unwrap();
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[1], array![[2, 2], [0, 0]]);
    }

    #[test]
    fn test_negative_labels_are_rejected() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 2, Int>::from_ints([[0, -1]], &device);

        assert!(matches!(
            label_map_from_tensor(tensor),
            Err(MetricError::TensorConversion { .. })
        ));
    }
}
