//! # tiseg-metric
//!
//! Instance-level evaluation metrics for nucleus and cell instance segmentation:
//! the Aggregated Jaccard Index (AJI) and Panoptic Quality (PQ), each in a
//! binary (foreground-only) and a class-wise flavor.
//!
//! ## Pipeline
//!
//! 1. [`relabel`] splits every label value into its 8-connected components and
//!    numbers them `1..=K` in raster order.
//! 2. [`PairwiseOverlap`] tabulates intersection and union of every
//!    ground-truth/prediction pair.
//! 3. [`match_aji`] or [`match_pq`] pairs instances and produces per-image
//!    sums.
//! 4. For class-wise metrics, [`partition`] buckets instances by the majority
//!    class of their pixels and matching is done per bucket.
//! 5. [`MetricAggregator`] sums the partials of all images and divides once.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tiseg_metric::{evaluate_dataset, EvalConfig, EvalSample, MetricKind};
//!
//! let config = EvalConfig::new(3).with_metrics(MetricKind::ALL.to_vec());
//! let samples = vec![EvalSample::new(pred_inst, gt_inst, pred_sem, gt_sem)];
//!
//! let report = evaluate_dataset(&config, &samples)?;
//! println!("mPQ: {:?}", report.scalar("mPQ"));
//! ```
//!
//! ## Features
//!
//! - `train`: [`InstanceMetric`], an implementation of burn's `Metric` and
//!   `Numeric` traits for use in a `Learner`.

pub mod classwise;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod instances;
pub mod labeling;
pub mod map;
pub mod matching;
pub mod metrics;
pub mod overlap;


pub use classwise::{ClassCase, ClasswiseView};
pub use config::{EvalConfig, MetricKind};
pub use error::{MetricError, MetricResult};
pub use evaluator::{evaluate_dataset, EvalSample, InstanceEvaluator};
pub use instances::{partition, ClassBuckets, InstanceRecord, InstanceSet};
pub use labeling::{relabel, relabel_with_count};
pub use map::{foreground, label_map_from_tensor, label_maps_from_batch, LabelMap};
pub use matching::{match_aji, match_pq, maximum_iou_assignment, AjiStats, PqStats};
pub use metrics::*;
pub use overlap::PairwiseOverlap;
