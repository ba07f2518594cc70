//! Configuration for directory evaluation runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tiseg_metric::EvalConfig;

/// Configuration for one evaluation run over a prediction and a ground-truth directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Metric configuration.
    pub eval: EvalConfig,
    /// Directory of predicted instance maps.
    pub pred_instance_dir: PathBuf,
    /// Directory of ground-truth instance maps.
    pub gt_instance_dir: PathBuf,
    /// Directory of predicted semantic maps. Without it every instance is class 1.
    pub pred_semantic_dir: Option<PathBuf>,
    /// Directory of ground-truth semantic maps.
    pub gt_semantic_dir: Option<PathBuf>,
    /// Worker threads for loading and scoring. None uses all cores.
    pub num_threads: Option<usize>,
    /// Where to write the JSON report, in addition to stdout.
    pub output_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            eval: EvalConfig::new(2),
            pred_instance_dir: PathBuf::from("predictions/instances"),
            gt_instance_dir: PathBuf::from("ground_truth/instances"),
            pred_semantic_dir: None,
            gt_semantic_dir: None,
            num_threads: None,
            output_path: None,
        }
    }
}

impl RunConfig {
    /// Returns `true` when both semantic directories are set.
    pub const fn has_semantics(&self) -> bool {
        self.pred_semantic_dir.is_some() && self.gt_semantic_dir.is_some()
    }
}
