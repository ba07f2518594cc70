//! Pairwise overlap statistics between ground-truth and predicted instances.
//!
//! Only pairs that actually share pixels are visited: for each ground-truth
//! instance the predicted labels under its mask are counted directly, so the
//! cost follows the number of overlap events instead of `K_gt * K_pred` mask
//! comparisons.

use std::collections::HashMap;

use ndarray::Array2;

use crate::{
    instances::{InstanceRecord, InstanceSet},
    map::LabelMap,
};

/// Dense `[num_gt, num_pred]` intersection and union tables for one bucket.
///
/// Rows and columns follow the order of the records the table was built from.
/// Pairs without spatial overlap hold zero in both tables.
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseOverlap {
    /// Pixel intersection per pair.
    pub intersection: Array2<f64>,
    /// Pixel union per overlapping pair.
    pub union: Array2<f64>,
    /// Area of each ground-truth instance.
    pub gt_areas: Vec<f64>,
    /// Area of each predicted instance.
    pub pred_areas: Vec<f64>,
}

impl PairwiseOverlap {
    /// Builds the tables for a subset of instances.
    ///
    /// `pred_labels` is the relabeled prediction map the `pred` records come
    /// from. Predicted pixels whose id is not among `pred` are ignored.
    #[must_use]
    pub fn build(gt: &[&InstanceRecord], pred: &[&InstanceRecord], pred_labels: &LabelMap) -> Self {
        let width = pred_labels.ncols();
        let columns: HashMap<u32, usize> = pred
            .iter()
            .enumerate()
            .map(|(col, record)| (record.id, col))
            .collect();

        let mut intersection = Array2::zeros((gt.len(), pred.len()));
        let mut union = Array2::zeros((gt.len(), pred.len()));
        let mut hits: HashMap<usize, usize> = HashMap::new();

        for (row, gt_record) in gt.iter().enumerate() {
            hits.clear();
            for &pixel in &gt_record.pixels {
                let pred_id = pred_labels[[pixel / width, pixel % width]];
                if pred_id == 0 {
                    continue;
                }
                if let Some(&col) = columns.get(&pred_id) {
                    *hits.entry(col).or_default() += 1;
                }
            }

            for (&col, &inter) in &hits {
                let total = gt_record.area() + pred[col].area();
                intersection[[row, col]] = inter as f64;
                union[[row, col]] = (total - inter) as f64;
            }
        }

        Self {
            intersection,
            union,
            gt_areas: gt.iter().map(|r| r.area() as f64).collect(),
            pred_areas: pred.iter().map(|r| r.area() as f64).collect(),
        }
    }

    /// Builds the tables over every instance of both maps.
    #[must_use]
    pub fn between(gt: &InstanceSet, pred: &InstanceSet) -> Self {
        let gt_records: Vec<&InstanceRecord> = gt.records().iter().collect();
        let pred_records: Vec<&InstanceRecord> = pred.records().iter().collect();
        Self::build(&gt_records, &pred_records, pred.labels())
    }

    /// Number of ground-truth rows.
    #[must_use]
    pub fn num_gt(&self) -> usize {
        self.gt_areas.len()
    }

    /// Number of prediction columns.
    #[must_use]
    pub fn num_pred(&self) -> usize {
        self.pred_areas.len()
    }

    /// Total ground-truth area.
    #[must_use]
    pub fn gt_total(&self) -> f64 {
        self.gt_areas.iter().sum()
    }

    /// Total predicted area.
    #[must_use]
    pub fn pred_total(&self) -> f64 {
        self.pred_areas.iter().sum()
    }

    /// IoU table smoothed by `epsilon` in the denominator, as used for AJI pairing.
    #[must_use]
    pub fn smoothed_iou(&self, epsilon: f64) -> Array2<f64> {
        &self.intersection / &(&self.union + epsilon)
    }

    /// Exact IoU table. Non-overlapping pairs are zero.
    #[must_use]
    pub fn iou(&self) -> Array2<f64> {
        let mut iou = self.intersection.clone();
        iou.zip_mut_with(&self.union, |value, &union| {
            if *value > 0.0 {
                *value /= union;
            }
        });
        iou
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_only_overlapping_pairs_are_filled() {
        let gt = InstanceSet::from_raw(&array![[1, 1, 0, 2], [1, 1, 0, 2]]);
        let pred = InstanceSet::from_raw(&array![[0, 5, 5, 0], [0, 5, 5, 0]]);

        let overlap = PairwiseOverlap::between(&gt, &pred);
        assert_eq!(overlap.intersection, array![[2.0], [0.0]]);
        assert_eq!(overlap.union, array![[6.0], [0.0]]);
        assert_eq!(overlap.gt_areas, vec![4.0, 2.0]);
        assert_eq!(overlap.pred_areas, vec![4.0]);
    }

    #[test]
    fn test_iou_tables() {
        let gt = InstanceSet::from_raw(&array![[1, 1, 1, 1]]);
        let pred = InstanceSet::from_raw(&array![[1, 1, 0, 0]]);

        let overlap = PairwiseOverlap::between(&gt, &pred);
        assert_relative_eq!(overlap.iou()[[0, 0]], 0.5);
        assert_relative_eq!(overlap.smoothed_iou(1e-6)[[0, 0]], 2.0 / (4.0 + 1e-6));
    }

    #[test]
    fn test_subset_ignores_foreign_predictions() {
        let gt = InstanceSet::from_raw(&array![[1, 1, 1, 1]]);
        let pred = InstanceSet::from_raw(&array![[1, 1, 2, 2]]);
        let gt_records: Vec<_> = gt.records().iter().collect();
        let pred_records = vec![&pred.records()[1]];

        let overlap = PairwiseOverlap::build(&gt_records, &pred_records, pred.labels());
        assert_eq!(overlap.num_pred(), 1);
        assert_eq!(overlap.intersection, array![[2.0]]);
        assert_eq!(overlap.union, array![[4.0]]);
    }

    #[test]
    fn test_empty_side_yields_empty_table() {
        let gt = InstanceSet::from_raw(&array![[1, 1]]);
        let pred = InstanceSet::from_raw(&array![[0, 0]]);

        let overlap = PairwiseOverlap::between(&gt, &pred);
        assert_eq!(overlap.intersection.dim(), (1, 0));
        assert_eq!(overlap.gt_total(), 2.0);
        assert_eq!(overlap.pred_total(), 0.0);
    }
}
