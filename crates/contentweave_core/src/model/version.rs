//! Multi-axis item versions.
//!
//! # Responsibility
//! - Represent which variant of an item is selected (e.g. `lang`, `stage`).
//! - Provide the specificity order and the least-abstract-common merge.
//!
//! # Invariants
//! - An absent axis is abstract: it matches any value on that axis.
//! - `least_abstract_common_version` is commutative and associative.
//! - Serialized form is `axis=value&axis=value` in axis order.

use super::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Version of an item across zero or more named axes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemVersion(BTreeMap<String, String>);

impl ItemVersion {
    /// The fully abstract version (no axis pinned).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `axis` pinned to `value`.
    pub fn with(mut self, axis: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(axis, value);
        self
    }

    pub fn set(&mut self, axis: impl Into<String>, value: impl Into<String>) {
        self.0.insert(axis.into(), value.into());
    }

    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0.get(axis).map(String::as_str)
    }

    pub fn axes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(axis, value)| (axis.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `other` lies inside the scope described by `self`.
    ///
    /// Every axis both versions share must agree; axes only one side pins are
    /// not applicable to the other and do not exclude it.
    pub fn admits(&self, other: &ItemVersion) -> bool {
        self.0
            .iter()
            .all(|(axis, value)| other.0.get(axis).map_or(true, |v| v == value))
    }

    /// Whether `self` narrows every axis `other` narrows, and at least one more.
    pub fn is_more_specific_than(&self, other: &ItemVersion) -> bool {
        self.0.len() > other.0.len()
            && other
                .0
                .iter()
                .all(|(axis, value)| self.0.get(axis) == Some(value))
    }

    /// Most specific version that is no more specific than either input.
    pub fn least_abstract_common_version(&self, other: &ItemVersion) -> ItemVersion {
        Self(
            self.0
                .iter()
                .filter(|(axis, value)| other.0.get(*axis) == Some(*value))
                .map(|(axis, value)| (axis.clone(), value.clone()))
                .collect(),
        )
    }

    /// Merges a set of versions; `None` when the set is empty.
    pub fn merge_all<'a>(versions: impl IntoIterator<Item = &'a ItemVersion>) -> Option<ItemVersion> {
        versions.into_iter().fold(None, |acc, version| match acc {
            None => Some(version.clone()),
            Some(common) => Some(common.least_abstract_common_version(version)),
        })
    }

    /// Keeps only the listed axes.
    pub fn restrict_to(&self, axes: &[String]) -> ItemVersion {
        Self(
            self.0
                .iter()
                .filter(|(axis, _)| axes.iter().any(|a| a == *axis))
                .map(|(axis, value)| (axis.clone(), value.clone()))
                .collect(),
        )
    }

    /// Returns `self` with every axis pinned by `overlay` replaced.
    pub fn overlaid_with(&self, overlay: &ItemVersion) -> ItemVersion {
        let mut merged = self.0.clone();
        for (axis, value) in &overlay.0 {
            merged.insert(axis.clone(), value.clone());
        }
        Self(merged)
    }
}

impl Display for ItemVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (position, (axis, value)) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str("&")?;
            }
            write!(f, "{axis}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for ItemVersion {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut version = ItemVersion::new();
        for pair in s.split('&').map(str::trim).filter(|p| !p.is_empty()) {
            let (axis, value) = pair
                .split_once('=')
                .ok_or_else(|| ModelError::Format(format!("version axis `{pair}` lacks `=`")))?;
            let axis = axis.trim();
            if axis.is_empty() {
                return Err(ModelError::Format(format!(
                    "version axis name is empty in `{s}`"
                )));
            }
            version.set(axis, value.trim());
        }
        Ok(version)
    }
}

impl<K, V> FromIterator<(K, V)> for ItemVersion
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(axis, value)| (axis.into(), value.into()))
                .collect(),
        )
    }
}
