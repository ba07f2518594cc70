//! Greedy best-prediction-per-truth pairing for AJI.

use serde::{Deserialize, Serialize};

use crate::overlap::PairwiseOverlap;

/// Summed intersection and union of one AJI pairing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AjiStats {
    /// Intersection of all paired instances.
    pub intersection: f64,
    /// Union of paired instances plus the area of every unpaired instance.
    pub union: f64,
}

impl AjiStats {
    /// `intersection / union`. NaN when both are zero.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.intersection / self.union
    }
}

/// Pairs every ground-truth row with its maximum-IoU prediction column.
///
/// Ties pick the first column. The same prediction can be chosen by several
/// rows. Rows whose best IoU is zero are unpaired and add their area to the
/// union, as does every prediction chosen by no row. With no row or no
/// column nothing can pair, so the intersection is zero and the union is the
/// area of whichever side is present.
#[must_use]
pub fn match_aji(overlap: &PairwiseOverlap, epsilon: f64) -> AjiStats {
    if overlap.num_gt() == 0 || overlap.num_pred() == 0 {
        return AjiStats {
            intersection: 0.0,
            union: overlap.gt_total() + overlap.pred_total(),
        };
    }

    let iou = overlap.smoothed_iou(epsilon);
    let mut stats = AjiStats::default();
    let mut pred_paired = vec![false; overlap.num_pred()];

    for (row, ious) in iou.outer_iter().enumerate() {
        let mut best_col = 0;
        for (col, &value) in ious.iter().enumerate() {
            if value > ious[best_col] {
                best_col = col;
            }
        }

        if ious[best_col] > 0.0 {
            stats.intersection += overlap.intersection[[row, best_col]];
            stats.union += overlap.union[[row, best_col]];
            pred_paired[best_col] = true;
        } else {
            stats.union += overlap.gt_areas[row];
        }
    }

    for (area, paired) in overlap.pred_areas.iter().zip(pred_paired) {
        if !paired {
            stats.union += area;
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances::InstanceSet;
    use approx::assert_relative_eq;
    use ndarray::array;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_identical_maps_score_one() {
        let map = array![[1, 1, 0, 2], [1, 1, 0, 2], [0, 0, 0, 0], [3, 3, 3, 0]];
        let set = InstanceSet::from_raw(&map);

        let stats = match_aji(&PairwiseOverlap::between(&set, &set), EPS);
        assert_relative_eq!(stats.intersection, 9.0);
        assert_relative_eq!(stats.union, 9.0);
        assert_relative_eq!(stats.score(), 1.0);
    }

    #[test]
    fn test_prediction_reused_by_two_truths() {
        // one merged prediction covers two ground-truth nuclei
        let gt = InstanceSet::from_raw(&array![[1, 1, 0, 2, 2]]);
        let pred = InstanceSet::from_raw(&array![[1, 1, 1, 1, 1]]);

        let stats = match_aji(&PairwiseOverlap::between(&gt, &pred), EPS);
        // both rows pair with the merged prediction: 2/5 and 2/5
        assert_relative_eq!(stats.intersection, 4.0);
        assert_relative_eq!(stats.union, 10.0);
    }

    #[test]
    fn test_unpaired_areas_join_the_union() {
        let gt = InstanceSet::from_raw(&array![[1, 1, 0, 0, 2, 2, 2]]);
        let pred = InstanceSet::from_raw(&array![[1, 1, 0, 3, 0, 0, 0]]);

        let stats = match_aji(&PairwiseOverlap::between(&gt, &pred), EPS);
        // truth 1 pairs exactly; truth 2 (3 px) and prediction 2 (1 px) are unpaired
        assert_relative_eq!(stats.intersection, 2.0);
        assert_relative_eq!(stats.union, 2.0 + 3.0 + 1.0);
    }

    #[test]
    fn test_ties_take_the_first_prediction() {
        let gt = InstanceSet::from_raw(&array![[1, 1, 1, 1]]);
        let pred = InstanceSet::from_raw(&array![[1, 1, 2, 2]]);

        let stats = match_aji(&PairwiseOverlap::between(&gt, &pred), EPS);
        // pairs with prediction 1; prediction 2 is unpaired
        assert_relative_eq!(stats.intersection, 2.0);
        assert_relative_eq!(stats.union, 4.0 + 2.0);
    }

    #[test]
    fn test_empty_side_contributes_only_union() {
        let gt = InstanceSet::from_raw(&array![[0, 0, 0]]);
        let pred = InstanceSet::from_raw(&array![[1, 1, 0]]);

        let stats = match_aji(&PairwiseOverlap::between(&gt, &pred), EPS);
        assert_eq!(stats, AjiStats {
            intersection: 0.0,
            union: 2.0
        });

        let empty = InstanceSet::from_raw(&array![[0, 0]]);
        let stats = match_aji(&PairwiseOverlap::between(&empty, &empty), EPS);
        assert_eq!(stats, AjiStats::default());
        assert!(stats.score().is_nan());
    }
}
