//! Directory-level evaluation of instance segmentation outputs.
//!
//! Pairs prediction and ground-truth label images by relative file name,
//! scores them in parallel with `tiseg-metric` and returns the dataset report.
//!
//! ## Usage
//!
//! ```bash
//! # Binary and class-wise metrics on instance maps only
//! cargo run --bin tiseg-eval -- --pred-dir out/inst --gt-dir data/inst
//!
//! # Class-wise metrics with semantic maps and a config file
//! cargo run --bin tiseg-eval -- --config eval.json \
//!     --pred-sem-dir out/sem --gt-sem-dir data/sem --output metrics.json
//! ```

pub mod config;
pub mod io;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tiseg_metric::{evaluate_dataset, EvalSample, MetricsReport};

pub use config::RunConfig;
pub use io::{collect_label_files, load_label_map, load_sample, pair_directories, SamplePaths};

/// Loads every image pair of `config` and evaluates the dataset.
pub fn evaluate_directories(config: &RunConfig) -> Result<MetricsReport> {
    let semantic_dirs = match (&config.pred_semantic_dir, &config.gt_semantic_dir) {
        (Some(pred), Some(gt)) => Some((pred.as_path(), gt.as_path())),
        (None, None) => None,
        _ => anyhow::bail!("Semantic directories must be given for both prediction and ground truth"),
    };

    let pairs = pair_directories(
        &config.pred_instance_dir,
        &config.gt_instance_dir,
        semantic_dirs,
    )?;

    let samples: Vec<EvalSample> = pairs
        .par_iter()
        .map(|paths| {
            load_sample(paths).with_context(|| format!("Failed to load image pair {}", paths.name))
        })
        .collect::<Result<_>>()?;

    evaluate_dataset(&config.eval, &samples).context("Evaluation failed")
}
