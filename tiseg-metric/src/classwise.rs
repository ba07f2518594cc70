//! Splits one image into per-class matching problems.

use crate::{
    error::MetricResult,
    instances::{partition, ClassBuckets, InstanceRecord, InstanceSet},
    map::LabelMap,
    overlap::PairwiseOverlap,
};

/// How one semantic class of an image takes part in matching.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassCase {
    /// No instance on either side.
    Absent,
    /// Background bucket: instances whose semantic majority is background.
    /// They are never matched, their areas count as errors.
    Background {
        /// Area of the predicted instances in the bucket.
        pred_area: f64,
        /// Area of the ground-truth instances in the bucket.
        gt_area: f64,
    },
    /// Only predicted instances carry this class.
    PredOnly {
        /// Their total area.
        area: f64,
    },
    /// Only ground-truth instances carry this class.
    GtOnly {
        /// Their total area.
        area: f64,
    },
    /// Both sides carry this class; match within the bucket.
    Both(PairwiseOverlap),
}

/// Prediction and ground truth of one image, partitioned by class.
#[derive(Debug, Clone)]
pub struct ClasswiseView<'a> {
    pred: &'a InstanceSet,
    gt: &'a InstanceSet,
    pred_buckets: ClassBuckets,
    gt_buckets: ClassBuckets,
}

impl<'a> ClasswiseView<'a> {
    /// Partitions both instance sets by their semantic maps.
    pub fn new(
        pred: &'a InstanceSet,
        gt: &'a InstanceSet,
        pred_semantic: &LabelMap,
        gt_semantic: &LabelMap,
        num_classes: usize,
    ) -> MetricResult<Self> {
        Ok(Self {
            pred,
            gt,
            pred_buckets: partition(pred, pred_semantic, num_classes)?,
            gt_buckets: partition(gt, gt_semantic, num_classes)?,
        })
    }

    /// Number of classes.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.pred_buckets.num_classes()
    }

    /// Predicted instances per class.
    #[must_use]
    pub const fn pred_buckets(&self) -> &ClassBuckets {
        &self.pred_buckets
    }

    /// Ground-truth instances per class.
    #[must_use]
    pub const fn gt_buckets(&self) -> &ClassBuckets {
        &self.gt_buckets
    }

    /// Resolves how `class` is scored.
    #[must_use]
    pub fn class_case(&self, class: usize) -> ClassCase {
        let pred = bucket_records(self.pred, self.pred_buckets.members(class));
        let gt = bucket_records(self.gt, self.gt_buckets.members(class));

        if pred.is_empty() && gt.is_empty() {
            return ClassCase::Absent;
        }
        if class == 0 {
            return ClassCase::Background {
                pred_area: total_area(&pred),
                gt_area: total_area(&gt),
            };
        }

        match (pred.is_empty(), gt.is_empty()) {
            (false, true) => ClassCase::PredOnly {
                area: total_area(&pred),
            },
            (true, false) => ClassCase::GtOnly {
                area: total_area(&gt),
            },
            _ => ClassCase::Both(PairwiseOverlap::build(&gt, &pred, self.pred.labels())),
        }
    }
}

fn bucket_records<'s>(set: &'s InstanceSet, ids: &[u32]) -> Vec<&'s InstanceRecord> {
    ids.iter().filter_map(|&id| set.get(id)).collect()
}

fn total_area(records: &[&InstanceRecord]) -> f64 {
    records.iter().map(|r| r.area() as f64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cases_per_class() {
        let pred_inst = array![[1, 1, 0, 2, 2, 0, 3]];
        let pred_sem = array![[1, 1, 0, 2, 2, 0, 0]];
        let gt_inst = array![[1, 1, 0, 0, 0, 0, 0]];
        let gt_sem = array![[1, 1, 0, 0, 0, 0, 0]];

        let pred = InstanceSet::from_raw(&pred_inst);
        let gt = InstanceSet::from_raw(&gt_inst);
        let view = ClasswiseView::new(&pred, &gt, &pred_sem, &gt_sem, 4).unwrap();

        assert_eq!(
            view.class_case(0),
            ClassCase::Background {
                pred_area: 1.0,
                gt_area: 0.0
            }
        );
        assert!(matches!(view.class_case(1), ClassCase::Both(ref o) if o.num_gt() == 1 && o.num_pred() == 1));
        assert_eq!(view.class_case(2), ClassCase::PredOnly { area: 2.0 });
        assert_eq!(view.class_case(3), ClassCase::Absent);
    }
}
