//! Experiment storage (append-only run groups)
//!
//! **Append-Only Write Pattern**:
//! - One run-group per experiment execution, numbered by creation order
//! - Each run-group carries attributes (`time` plus caller headers)
//! - Each sensor gets a growable 1-D `f64` array; arrays only grow
//! - NOT supported: deleting groups, editing or truncating arrays
//!
//! ```text
//! /
//!   <prefix><run-index>/
//!     @time = <unix timestamp at creation>
//!     @<header-key> = <header-value>
//!     <sensor-name>   (growable f64 array)
//! ```
//!
//! [`StoreLayout`] is the in-memory model shared by all backends. A
//! [`RunStore`] persists it to a single file:
//! - [`JournalRunStore`]: JSON-lines journal, appended on every write
//! - [`ParquetRunStore`]: Arrow/Parquet snapshot, rewritten on flush
//!
//! Stores are single-writer: the file handle is owned exclusively by the
//! store for its lifetime.

mod columnar;
mod journal;

pub use columnar::ParquetRunStore;
pub use journal::JournalRunStore;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Attribute value attached to a run-group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
}

impl AttrValue {
    /// Get the value as a float, if numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Get the value as text, if textual.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Check if every backend can store the value.
    ///
    /// NaN and infinite floats have no JSON encoding in the run-group
    /// metadata, so they are rejected as attributes.
    #[must_use]
    pub fn is_storable(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            Self::Bool(_) | Self::Int(_) | Self::Text(_) => true,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or_else(|_| Self::Text(v.to_string()), Self::Int)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One run-group: attributes plus named growable arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunGroup {
    attributes: BTreeMap<String, AttrValue>,
    arrays: BTreeMap<String, Vec<f64>>,
}

impl RunGroup {
    /// Get an attribute by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Get all attributes.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    /// Get an array by name.
    #[must_use]
    pub fn array(&self, name: &str) -> Option<&[f64]> {
        self.arrays.get(name).map(Vec::as_slice)
    }

    /// Get all array names.
    pub fn array_names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Check if an array exists.
    #[must_use]
    pub fn contains_array(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }
}

/// In-memory model of a store file: ordered run-groups.
///
/// All structural invariants are enforced here so every backend rejects
/// the same operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreLayout {
    runs: Vec<(String, RunGroup)>,
}

impl StoreLayout {
    /// Create an empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of run-groups.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Run-group names in creation order.
    pub fn run_names(&self) -> impl Iterator<Item = &str> {
        self.runs.iter().map(|(name, _)| name.as_str())
    }

    /// Run-groups with their names, in creation order.
    pub fn runs(&self) -> impl Iterator<Item = (&str, &RunGroup)> {
        self.runs.iter().map(|(name, group)| (name.as_str(), group))
    }

    /// Get a run-group by name.
    #[must_use]
    pub fn run(&self, name: &str) -> Option<&RunGroup> {
        self.runs.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    fn run_mut(&mut self, name: &str) -> Result<&mut RunGroup> {
        self.runs
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, g)| g)
            .ok_or_else(|| missing_run(name))
    }

    fn existing_run(&self, name: &str) -> Result<&RunGroup> {
        self.run(name).ok_or_else(|| missing_run(name))
    }

    fn check_create_run(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::StorageError("run group name must not be empty".to_string()));
        }
        if self.run(name).is_some() {
            return Err(Error::StorageError(format!("run group '{name}' already exists")));
        }
        Ok(())
    }

    fn check_set_attribute(&self, run: &str, key: &str, value: &AttrValue) -> Result<()> {
        self.existing_run(run)?;
        if !value.is_storable() {
            return Err(Error::InvalidInput(format!(
                "attribute '{key}' of run group '{run}' must be finite, got {value}"
            )));
        }
        Ok(())
    }

    fn check_create_array(&self, run: &str, name: &str) -> Result<()> {
        if self.existing_run(run)?.contains_array(name) {
            return Err(Error::StorageError(format!(
                "array '{name}' already exists in run group '{run}'"
            )));
        }
        Ok(())
    }

    fn check_append(&self, run: &str, name: &str) -> Result<()> {
        if !self.existing_run(run)?.contains_array(name) {
            return Err(Error::StorageError(format!(
                "array '{name}' does not exist in run group '{run}'"
            )));
        }
        Ok(())
    }

    /// Add an empty run-group.
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty or already taken
    pub fn create_run(&mut self, name: &str) -> Result<()> {
        self.check_create_run(name)?;
        self.runs.push((name.to_string(), RunGroup::default()));
        Ok(())
    }

    /// Set (or overwrite) a run-group attribute.
    ///
    /// # Errors
    ///
    /// Returns error if the run-group does not exist, or the value is a
    /// non-finite float
    pub fn set_attribute(&mut self, run: &str, key: &str, value: AttrValue) -> Result<()> {
        self.check_set_attribute(run, key, &value)?;
        self.run_mut(run)?.attributes.insert(key.to_string(), value);
        Ok(())
    }

    /// Create a new array initialized with `data`.
    ///
    /// # Errors
    ///
    /// Returns error if the run-group is missing or the array already exists
    pub fn create_array(&mut self, run: &str, name: &str, data: &[f64]) -> Result<()> {
        self.check_create_array(run, name)?;
        self.run_mut(run)?.arrays.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    /// Append `data` to an existing array, preserving order.
    ///
    /// # Errors
    ///
    /// Returns error if the run-group or the array does not exist
    pub fn append(&mut self, run: &str, name: &str, data: &[f64]) -> Result<()> {
        self.check_append(run, name)?;
        if let Some(array) = self.run_mut(run)?.arrays.get_mut(name) {
            array.extend_from_slice(data);
        }
        Ok(())
    }
}

fn missing_run(name: &str) -> Error {
    Error::StorageError(format!("run group '{name}' does not exist"))
}

/// Storage backend for experiment run-groups.
///
/// Backends differ only in file encoding; every backend must produce the
/// same run-group, attribute and array semantics.
pub trait RunStore {
    /// Open the store file, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created, or exists but is corrupt
    fn open(path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Current contents of the store.
    fn layout(&self) -> &StoreLayout;

    /// Number of run-groups in the store.
    fn run_count(&self) -> usize {
        self.layout().run_count()
    }

    /// Check if `run` holds an array called `name`.
    fn contains_array(&self, run: &str, name: &str) -> bool {
        self.layout()
            .run(run)
            .is_some_and(|group| group.contains_array(name))
    }

    /// Create an empty run-group.
    ///
    /// # Errors
    ///
    /// Returns error if the group exists, or the store is closed
    fn create_run(&mut self, name: &str) -> Result<()>;

    /// Set a run-group attribute.
    ///
    /// # Errors
    ///
    /// Returns error if the group is missing, or the store is closed
    fn set_attribute(&mut self, run: &str, key: &str, value: AttrValue) -> Result<()>;

    /// Create a growable array initialized with `data`.
    ///
    /// # Errors
    ///
    /// Returns error if the array exists, or the store is closed
    fn create_array(&mut self, run: &str, name: &str, data: &[f64]) -> Result<()>;

    /// Append `data` to an existing array.
    ///
    /// # Errors
    ///
    /// Returns error if the array is missing, or the store is closed
    fn append(&mut self, run: &str, name: &str, data: &[f64]) -> Result<()>;

    /// Make all writes so far durable.
    ///
    /// # Errors
    ///
    /// Returns error if writing or syncing the file fails
    fn flush(&mut self) -> Result<()>;

    /// Flush and release the file handle. Further writes fail with
    /// [`Error::StoreClosed`]. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if the final flush fails
    fn close(&mut self) -> Result<()>;

    /// Check if the store has been closed.
    fn is_closed(&self) -> bool;
}
