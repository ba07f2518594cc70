//! Label image discovery and loading.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use image::DynamicImage;
use tiseg_metric::{EvalSample, LabelMap};
use walkdir::WalkDir;

/// Extensions accepted for label images.
const VALID_EXTENSIONS: [&str; 3] = ["png", "tif", "tiff"];

/// Files making up one image across the input directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePaths {
    /// Path relative to the instance root, without extension.
    pub name: String,
    pub pred_instances: PathBuf,
    pub gt_instances: PathBuf,
    pub pred_semantic: Option<PathBuf>,
    pub gt_semantic: Option<PathBuf>,
}

/// Label images below `root`, keyed by relative path without extension.
pub fn collect_label_files(root: &Path) -> Result<BTreeMap<String, PathBuf>> {
    if !root.is_dir() {
        bail!("Label directory does not exist: {}", root.display());
    }

    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to walk directory {}", root.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !has_label_extension(path) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
        files.insert(relative.to_string_lossy().replace('\\', "/"), path.to_path_buf());
    }
    Ok(files)
}

fn has_label_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VALID_EXTENSIONS
                .iter()
                .any(|valid| ext.eq_ignore_ascii_case(valid))
        })
}

/// Pairs every ground-truth instance map with its prediction and, when
/// given, both semantic maps. Ground truth without a prediction is skipped
/// with a warning.
pub fn pair_directories(
    pred_instance_dir: &Path,
    gt_instance_dir: &Path,
    semantic_dirs: Option<(&Path, &Path)>,
) -> Result<Vec<SamplePaths>> {
    let pred_instances = collect_label_files(pred_instance_dir)?;
    let gt_instances = collect_label_files(gt_instance_dir)?;
    let semantics = semantic_dirs
        .map(|(pred, gt)| Ok::<_, anyhow::Error>((collect_label_files(pred)?, collect_label_files(gt)?)))
        .transpose()?;

    let mut samples = Vec::with_capacity(gt_instances.len());
    for (name, gt_path) in gt_instances {
        let Some(pred_path) = pred_instances.get(&name) else {
            tracing::warn!(%name, "no prediction found, skipping");
            continue;
        };

        let (pred_semantic, gt_semantic) = match &semantics {
            Some((pred_sem, gt_sem)) => {
                let (Some(pred), Some(gt)) = (pred_sem.get(&name), gt_sem.get(&name)) else {
                    bail!("Missing semantic map for {name}");
                };
                (Some(pred.clone()), Some(gt.clone()))
            }
            None => (None, None),
        };

        samples.push(SamplePaths {
            name,
            pred_instances: pred_path.clone(),
            gt_instances: gt_path,
            pred_semantic,
            gt_semantic,
        });
    }

    if samples.is_empty() {
        bail!(
            "No prediction/ground-truth pairs found in {} and {}",
            pred_instance_dir.display(),
            gt_instance_dir.display()
        );
    }

    tracing::info!(pairs = samples.len(), "collected image pairs");
    Ok(samples)
}

/// Loads an 8- or 16-bit grayscale image as label map. Values are taken as-is.
pub fn load_label_map(path: &Path) -> Result<LabelMap> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open label image {}", path.display()))?;
    let (width, height) = (image.width() as usize, image.height() as usize);

    let values: Vec<u32> = match image {
        DynamicImage::ImageLuma8(buffer) => buffer.into_raw().into_iter().map(u32::from).collect(),
        DynamicImage::ImageLuma16(buffer) => {
            buffer.into_raw().into_iter().map(u32::from).collect()
        }
        other => bail!(
            "Label image {} must be 8- or 16-bit grayscale, got {:?}",
            path.display(),
            other.color()
        ),
    };

    LabelMap::from_shape_vec((height, width), values)
        .with_context(|| format!("Invalid label image dimensions in {}", path.display()))
}

/// Loads the maps of one image. Missing semantic maps are derived from the
/// instance maps.
pub fn load_sample(paths: &SamplePaths) -> Result<EvalSample> {
    let pred_instances = load_label_map(&paths.pred_instances)?;
    let gt_instances = load_label_map(&paths.gt_instances)?;

    match (&paths.pred_semantic, &paths.gt_semantic) {
        (Some(pred), Some(gt)) => Ok(EvalSample::new(
            pred_instances,
            gt_instances,
            load_label_map(pred)?,
            load_label_map(gt)?,
        )),
        _ => Ok(EvalSample::binary(pred_instances, gt_instances)),
    }
}
