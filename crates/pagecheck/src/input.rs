//! Pending form input accumulated between navigations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Attached files keyed by normalized field name
pub type UploadMap = BTreeMap<String, PathBuf>;

/// A value typed, ticked or selected into a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    /// Text, option value, or attached path
    Text(String),
    /// Checkbox state
    Flag(bool),
}

impl fmt::Display for InputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Flag(true) => f.write_str("1"),
            Self::Flag(false) => Ok(()),
        }
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Snapshot of pending inputs and uploads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    /// Inputs in the order they were first stored
    pub inputs: Vec<(String, InputValue)>,
    /// Attached files
    pub uploads: UploadMap,
}

/// Insertion-ordered field inputs plus the upload map.
///
/// Names are normalized on the way in: a leading `#` and trailing `[]` are
/// removed, so `#tags[]` and `tags` address the same entry.
#[derive(Debug, Clone, Default)]
pub struct InputStore {
    inputs: Vec<(String, InputValue)>,
    uploads: UploadMap,
}

impl InputStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any earlier value for the same field
    pub fn set(&mut self, name: &str, value: impl Into<InputValue>) {
        let key = normalize_name(name);
        let value = value.into();
        tracing::trace!(field = %key, value = %value, "store input");

        match self.inputs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.inputs.push((key, value)),
        }
    }

    /// Record an attached file and store its path as the field's input
    pub fn attach(&mut self, name: &str, path: impl Into<PathBuf>) {
        let path = path.into();
        let key = normalize_name(name);
        self.uploads.insert(key.clone(), path.clone());
        self.set(&key, path.to_string_lossy().into_owned());
    }

    /// Current value for a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InputValue> {
        let key = normalize_name(name);
        self.inputs.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Attached file for a field
    #[must_use]
    pub fn upload(&self, name: &str) -> Option<&PathBuf> {
        self.uploads.get(&normalize_name(name))
    }

    /// Pending inputs in insertion order
    #[must_use]
    pub fn inputs(&self) -> &[(String, InputValue)] {
        &self.inputs
    }

    /// Attached files
    #[must_use]
    pub fn uploads(&self) -> &UploadMap {
        &self.uploads
    }

    /// Copy of the pending state, leaving the store untouched
    #[must_use]
    pub fn snapshot(&self) -> InputSnapshot {
        InputSnapshot {
            inputs: self.inputs.clone(),
            uploads: self.uploads.clone(),
        }
    }

    /// Drop all inputs and uploads
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.uploads.clear();
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.uploads.is_empty()
    }
}

/// Strip a leading `#` and a trailing `[]` from a field name
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let name = name.strip_prefix('#').unwrap_or(name);
    name.strip_suffix("[]").unwrap_or(name).to_string()
}
