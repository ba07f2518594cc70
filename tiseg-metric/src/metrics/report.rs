//! Named metric results.

use std::collections::{btree_map, BTreeMap};

use serde::{Deserialize, Serialize};

/// A reported value: a scalar or one value per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    PerClass(Vec<f64>),
}

impl MetricValue {
    fn values_mut(&mut self) -> &mut [f64] {
        match self {
            Self::Scalar(value) => std::slice::from_mut(value),
            Self::PerClass(values) => values,
        }
    }

    fn values(&self) -> &[f64] {
        match self {
            Self::Scalar(value) => std::slice::from_ref(value),
            Self::PerClass(values) => values,
        }
    }
}

/// Metric name to value, e.g. `"mAji"` or `"PQ"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsReport {
    entries: BTreeMap<String, MetricValue>,
}

impl MetricsReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_scalar(&mut self, name: impl Into<String>, value: f64) {
        self.entries.insert(name.into(), MetricValue::Scalar(value));
    }

    pub fn insert_per_class(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.entries.insert(name.into(), MetricValue::PerClass(values));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries.get(name)
    }

    /// Scalar entry `name`, `None` if missing or per-class.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.entries.get(name) {
            Some(MetricValue::Scalar(value)) => Some(*value),
            _ => None,
        }
    }

    /// Per-class entry `name`, `None` if missing or scalar.
    #[must_use]
    pub fn per_class(&self, name: &str) -> Option<&[f64]> {
        match self.entries.get(name) {
            Some(MetricValue::PerClass(values)) => Some(values),
            _ => None,
        }
    }

    /// Moves all entries of `other` into `self`. Keys in `other` win.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MetricValue> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any reported value is NaN.
    #[must_use]
    pub fn has_nan(&self) -> bool {
        self.entries
            .values()
            .any(|value| value.values().iter().any(|v| v.is_nan()))
    }

    /// Replaces NaN with `fill`, `+inf` with `f64::MAX` and `-inf` with `f64::MIN`.
    pub fn nan_to_num(&mut self, fill: f64) {
        for value in self.entries.values_mut() {
            for v in value.values_mut() {
                *v = nan_to_num(*v, fill);
            }
        }
    }
}

impl<'a> IntoIterator for &'a MetricsReport {
    type Item = (&'a String, &'a MetricValue);
    type IntoIter = btree_map::Iter<'a, String, MetricValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn nan_to_num(value: f64, fill: f64) -> f64 {
    if value.is_nan() {
        fill
    } else if value == f64::INFINITY {
        f64::MAX
    } else if value == f64::NEG_INFINITY {
        f64::MIN
    } else {
        value
    }
}
