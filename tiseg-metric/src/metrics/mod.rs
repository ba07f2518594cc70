//! Instance segmentation metrics.
//!
//! Every metric is computed in two steps. A pre-eval function turns one
//! image into a small partial ([`PreEvalResult`]); a reduction sums the
//! partials of a dataset and divides once. Dataset scores are therefore
//! pixel-weighted over the whole dataset, not averages of per-image scores.

pub mod aggregator;
pub mod aji;
pub mod input;
#[cfg(feature = "train")]
pub mod instance;
pub mod partial;
pub mod pq;
pub mod report;

pub use aggregator::*;
pub use aji::*;
pub use input::*;
#[cfg(feature = "train")]
pub use instance::*;
pub use partial::*;
pub use pq::*;
pub use report::*;
