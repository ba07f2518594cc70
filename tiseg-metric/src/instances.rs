//! Per-image instance records and class partitioning.

use crate::{
    error::{MetricError, MetricResult},
    labeling::relabel_with_count,
    map::LabelMap,
};

/// One instance of a relabeled map.
///
/// The mask is stored sparsely as row-major flat pixel indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    /// Contiguous instance id, starting at 1.
    pub id: u32,
    /// Flat indices of the instance pixels.
    pub pixels: Vec<usize>,
}

impl InstanceRecord {
    /// Number of pixels in the instance.
    #[must_use]
    pub fn area(&self) -> usize {
        self.pixels.len()
    }
}

/// All instances of one map after relabeling.
#[derive(Debug, Clone)]
pub struct InstanceSet {
    labels: LabelMap,
    records: Vec<InstanceRecord>,
}

impl InstanceSet {
    /// Relabels `mask` and collects one record per connected instance.
    #[must_use]
    pub fn from_raw(mask: &LabelMap) -> Self {
        let (labels, count) = relabel_with_count(mask);
        let mut records: Vec<InstanceRecord> = (1..=count as u32)
            .map(|id| InstanceRecord {
                id,
                pixels: Vec::new(),
            })
            .collect();

        for (index, &id) in labels.iter().enumerate() {
            if id > 0 {
                records[id as usize - 1].pixels.push(index);
            }
        }

        Self { labels, records }
    }

    /// The relabeled map.
    #[must_use]
    pub const fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Records ordered by id.
    #[must_use]
    pub fn records(&self) -> &[InstanceRecord] {
        &self.records
    }

    /// The record with the given id, if any.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&InstanceRecord> {
        id.checked_sub(1)
            .and_then(|index| self.records.get(index as usize))
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the map holds no instance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total foreground pixel count.
    #[must_use]
    pub fn total_area(&self) -> usize {
        self.records.iter().map(InstanceRecord::area).sum()
    }

    /// Fails if the set holds more than `cap` instances.
    pub fn ensure_at_most(&self, cap: Option<usize>, side: &'static str) -> MetricResult<()> {
        match cap {
            Some(cap) if self.len() > cap => Err(MetricError::TooManyInstances {
                side,
                count: self.len(),
                cap,
            }),
            _ => Ok(()),
        }
    }
}

/// Instance ids grouped by their assigned semantic class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassBuckets {
    /// Class of each instance, indexed by `id - 1`.
    assignments: Vec<usize>,
    /// Instance ids per class, indexed by class.
    members: Vec<Vec<u32>>,
}

impl ClassBuckets {
    /// Number of classes the buckets were built for.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.members.len()
    }

    /// Instance ids assigned to `class`, in id order.
    #[must_use]
    pub fn members(&self, class: usize) -> &[u32] {
        self.members.get(class).map(Vec::as_slice).unwrap_or_default()
    }

    /// The class assigned to instance `id`.
    #[must_use]
    pub fn class_of(&self, id: u32) -> Option<usize> {
        id.checked_sub(1)
            .and_then(|index| self.assignments.get(index as usize))
            .copied()
    }

    /// Classes holding at least one instance.
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        self.members
            .iter()
            .enumerate()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(class, _)| class)
    }
}

/// Assigns every instance to the class it overlaps most in `semantic`.
///
/// Ties go to the lowest class index. Instances whose pixels are mostly
/// semantic background end up in class 0.
///
/// # Errors
///
/// Returns `Err(MetricError::ShapeMismatch)` if `semantic` is not aligned with
/// the instance map and `Err(MetricError::ClassOutOfRange)` if any of its
/// pixels, background included, holds a label `>= num_classes`.
pub fn partition(
    instances: &InstanceSet,
    semantic: &LabelMap,
    num_classes: usize,
) -> MetricResult<ClassBuckets> {
    crate::map::ensure_same_shape("instance map vs semantic map", instances.labels(), semantic)?;
    if let Some(&value) = semantic.iter().find(|&&class| class as usize >= num_classes) {
        return Err(MetricError::ClassOutOfRange { value, num_classes });
    }

    let width = semantic.ncols();
    let mut histogram = vec![0usize; num_classes];
    let mut assignments = Vec::with_capacity(instances.len());
    let mut members = vec![Vec::new(); num_classes];

    for record in instances.records() {
        histogram.fill(0);
        for &pixel in &record.pixels {
            histogram[semantic[[pixel / width, pixel % width]] as usize] += 1;
        }

        let class = first_argmax(&histogram);
        assignments.push(class);
        members[class].push(record.id);
    }

    Ok(ClassBuckets {
        assignments,
        members,
    })
}

fn first_argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (index, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = index;
        }
    }
    best
}
