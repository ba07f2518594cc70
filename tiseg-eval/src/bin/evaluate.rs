//! Instance Segmentation Evaluation
//!
//! Scores a directory of predicted label images against ground truth with
//! AJI and PQ and prints the report as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Binary metrics only
//! cargo run --bin tiseg-eval -- --pred-dir out/inst --gt-dir data/inst --metrics b-aji,b-pq
//!
//! # Class-wise metrics for 5 classes, NaN scores reported as 0
//! cargo run --bin tiseg-eval -- --pred-dir out/inst --gt-dir data/inst \
//!     --pred-sem-dir out/sem --gt-sem-dir data/sem --num-classes 5 --nan-to-num 0
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tiseg_eval::{evaluate_directories, RunConfig};
use tiseg_metric::MetricKind;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    /// Binary Aggregated Jaccard Index
    #[value(name = "b-aji")]
    BAji,
    /// Class-wise Aggregated Jaccard Index
    #[value(name = "aji")]
    Aji,
    /// Binary Panoptic Quality
    #[value(name = "b-pq")]
    BPq,
    /// Class-wise Panoptic Quality
    #[value(name = "pq")]
    Pq,
}

impl From<MetricArg> for MetricKind {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::BAji => Self::BinaryAji,
            MetricArg::Aji => Self::Aji,
            MetricArg::BPq => Self::BinaryPq,
            MetricArg::Pq => Self::Pq,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of predicted instance maps
    #[arg(long)]
    pred_dir: Option<PathBuf>,

    /// Directory of ground-truth instance maps
    #[arg(long)]
    gt_dir: Option<PathBuf>,

    /// Directory of predicted semantic maps
    #[arg(long, requires = "gt_sem_dir")]
    pred_sem_dir: Option<PathBuf>,

    /// Directory of ground-truth semantic maps
    #[arg(long, requires = "pred_sem_dir")]
    gt_sem_dir: Option<PathBuf>,

    /// Number of semantic classes, background included
    #[arg(long)]
    num_classes: Option<usize>,

    /// Metrics to compute
    #[arg(long, value_enum, value_delimiter = ',')]
    metrics: Vec<MetricArg>,

    /// IoU a pair must exceed to count as a PQ match
    #[arg(long)]
    match_iou: Option<f64>,

    /// Replace NaN scores with this value
    #[arg(long)]
    nan_to_num: Option<f64>,

    /// Include the background class in class means
    #[arg(long)]
    keep_zero_class: bool,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Write the JSON report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(args)?;

    if let Some(threads) = config.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure the worker pool")?;
    }

    let report = evaluate_directories(&config)?;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{json}");

    if let Some(output) = &config.output_path {
        std::fs::write(output, &json)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
        tracing::info!(path = %output.display(), "report written");
    }

    Ok(())
}

/// Loads the configuration file, if any, and applies command line overrides.
fn build_config(args: Args) -> Result<RunConfig> {
    let mut config = if let Some(config_path) = &args.config {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        serde_json::from_str::<RunConfig>(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
    } else {
        RunConfig::default()
    };

    if let Some(dir) = args.pred_dir {
        config.pred_instance_dir = dir;
    }
    if let Some(dir) = args.gt_dir {
        config.gt_instance_dir = dir;
    }
    if args.pred_sem_dir.is_some() {
        config.pred_semantic_dir = args.pred_sem_dir;
        config.gt_semantic_dir = args.gt_sem_dir;
    }
    if let Some(num_classes) = args.num_classes {
        config.eval.num_classes = num_classes;
    }
    if !args.metrics.is_empty() {
        config.eval.metrics = args.metrics.into_iter().map(MetricKind::from).collect();
    }
    if let Some(match_iou) = args.match_iou {
        config.eval.match_iou = match_iou;
    }
    if args.nan_to_num.is_some() {
        config.eval.nan_to_num = args.nan_to_num;
    }
    if args.keep_zero_class {
        config.eval.reduce_zero_class = false;
    }
    if args.threads.is_some() {
        config.num_threads = args.threads;
    }
    if args.output.is_some() {
        config.output_path = args.output;
    }

    config
        .eval
        .validate()
        .context("Invalid evaluation configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_defaults() {
        let args = Args::parse_from([
            "tiseg-eval",
            "--pred-dir",
            "p",
            "--gt-dir",
            "g",
            "--metrics",
            "b-aji,pq",
            "--num-classes",
            "4",
            "--match-iou",
            "0.3",
        ]);
        let config = build_config(args).unwrap();

        assert_eq!(config.pred_instance_dir, PathBuf::from("p"));
        assert_eq!(config.eval.num_classes, 4);
        assert_eq!(
            config.eval.metrics,
            vec![MetricKind::BinaryAji, MetricKind::Pq]
        );
        assert_eq!(config.eval.match_iou, 0.3);
        assert!(!config.has_semantics());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = Args::parse_from(["tiseg-eval", "--num-classes", "1"]);
        assert!(build_config(args).is_err());
    }

    #[test]
    fn test_semantic_dirs_come_in_pairs() {
        let result = Args::try_parse_from(["tiseg-eval", "--pred-sem-dir", "s"]);
        assert!(result.is_err());
    }
}
