//! Pairing of predicted and ground-truth instances.
//!
//! Two policies are implemented:
//!
//! - [`match_aji`]: every ground-truth instance takes its best-IoU prediction.
//!   A prediction may be the best match of several ground-truth instances.
//!   This reuse is part of the Aggregated Jaccard Index definition.
//! - [`match_pq`]: one-to-one pairing above an IoU threshold, by plain
//!   thresholding when the threshold is at least 0.5 and by optimal
//!   assignment below it.

pub mod aji;
pub mod assignment;
pub mod pq;

pub use aji::{match_aji, AjiStats};
pub use assignment::maximum_iou_assignment;
pub use pq::{match_pq, PqStats};
