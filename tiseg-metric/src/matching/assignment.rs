//! Maximum-total-IoU one-to-one assignment.

use ndarray::Array2;
use pathfinding::{kuhn_munkres::kuhn_munkres, matrix::Matrix};

use crate::error::{MetricError, MetricResult};

/// IoU values are scaled to integers for the Kuhn–Munkres solver.
const IOU_SCALE: f64 = 1e9;

/// Solves the assignment maximizing the summed IoU.
///
/// Equivalent to a minimum-cost assignment on the negated IoU matrix. The
/// matrix is padded to square with zero-IoU dummies, which are stripped from
/// the result. Returns `(row, col)` pairs sorted by row; at most
/// `min(rows, cols)` pairs are returned and some may have zero IoU.
pub fn maximum_iou_assignment(iou: &Array2<f64>) -> MetricResult<Vec<(usize, usize)>> {
    let (rows, cols) = iou.dim();
    if rows == 0 || cols == 0 {
        return Ok(Vec::new());
    }

    let size = rows.max(cols);
    let mut weights = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            let weight = if row < rows && col < cols {
                (iou[[row, col]] * IOU_SCALE).round() as i64
            } else {
                0
            };
            weights.push(weight);
        }
    }

    let matrix = Matrix::from_vec(size, size, weights).map_err(|e| MetricError::Assignment {
        reason: format!("{e:?}"),
    })?;
    let (_, assigned_cols) = kuhn_munkres(&matrix);

    Ok(assigned_cols
        .into_iter()
        .enumerate()
        .filter(|&(row, col)| row < rows && col < cols)
        .collect())
}
