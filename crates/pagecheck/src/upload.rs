//! File upload normalization.
//!
//! A form reports its file inputs as flat field names (`photos[0][avatar]`),
//! while multipart bodies group array fields as nested structures. [`normalize`]
//! substitutes attached files for the declared descriptors and rebuilds the
//! nesting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::input::UploadMap;

/// Upload status code carried by every file descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UploadStatus {
    /// File is present and readable
    Ok,
    /// No file was supplied for the field
    #[default]
    NoFile,
}

impl UploadStatus {
    /// Numeric error code as sent by browsers' upload handlers
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::NoFile => 4,
        }
    }
}

/// A file input as declared by the form
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Location of the file contents, when one was supplied
    pub tmp_path: Option<PathBuf>,
    /// File name as presented to the server
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Status code
    pub status: UploadStatus,
}

impl FileDescriptor {
    /// Descriptor for a file input with nothing selected
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Describe the file at `path`.
    ///
    /// An unreadable path yields an empty descriptor with [`UploadStatus::NoFile`].
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => Self {
                tmp_path: Some(path.to_path_buf()),
                name: basename(path),
                mime_type: mime_guess::from_path(path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
                size: meta.len(),
                status: UploadStatus::Ok,
            },
            _ => Self::empty(),
        }
    }
}

/// A file ready to be sent with a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// File on disk
    pub path: PathBuf,
    /// Display name (basename of the attached path)
    pub original_name: String,
    /// MIME type
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Status code
    pub status: UploadStatus,
    /// Marks files produced by the test harness rather than a real upload
    pub test: bool,
}

impl UploadedFile {
    /// Build from a declared descriptor and the path the test attached
    #[must_use]
    pub fn from_descriptor(descriptor: &FileDescriptor, attached: &Path) -> Self {
        Self {
            path: descriptor
                .tmp_path
                .clone()
                .unwrap_or_else(|| attached.to_path_buf()),
            original_name: basename(attached),
            mime_type: descriptor.mime_type.clone(),
            size: descriptor.size,
            status: descriptor.status,
            test: true,
        }
    }
}

/// One entry of the normalized upload payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadValue {
    /// Declared field with no attached file
    Descriptor(FileDescriptor),
    /// Attached file
    File(UploadedFile),
    /// Nested array group
    Nested(BTreeMap<String, UploadValue>),
}

impl UploadValue {
    /// Look up a child of a nested group
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&UploadValue> {
        match self {
            Self::Nested(map) => map.get(key),
            _ => None,
        }
    }

    /// The attached file, if this is a leaf holding one
    #[must_use]
    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            Self::File(file) => Some(file),
            _ => None,
        }
    }

    /// Nesting depth (leaves are 0)
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Nested(map) => 1 + map.values().map(Self::depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Walk the tree, yielding bracketed field names for every leaf.
    ///
    /// This is the inverse of nesting and is what multipart encoders send.
    #[must_use]
    pub fn flatten(key: &str, value: &UploadValue) -> Vec<(String, UploadValue)> {
        match value {
            Self::Nested(map) => map
                .iter()
                .flat_map(|(child, inner)| Self::flatten(&format!("{key}[{child}]"), inner))
                .collect(),
            leaf => vec![(key.to_string(), leaf.clone())],
        }
    }
}

/// Normalized upload payload keyed by top-level field name
pub type Uploads = BTreeMap<String, UploadValue>;

/// Substitute attached files for declared descriptors and nest bracketed keys.
///
/// Declared fields without an override pass through as descriptors. Keys like
/// `photos[0][avatar]` become `{photos: {0: {avatar: ..}}}`; siblings sharing
/// a prefix are merged.
#[must_use]
pub fn normalize(declared: &[(String, FileDescriptor)], overrides: &UploadMap) -> Uploads {
    let mut uploads = Uploads::new();

    for (key, descriptor) in declared {
        let value = match lookup_override(overrides, key) {
            Some(path) => UploadValue::File(UploadedFile::from_descriptor(descriptor, path)),
            None => UploadValue::Descriptor(descriptor.clone()),
        };

        match bracket_segments(key) {
            Some((base, segments)) => {
                let nested = segments
                    .into_iter()
                    .rev()
                    .fold(value, |inner, segment| {
                        UploadValue::Nested(BTreeMap::from([(segment, inner)]))
                    });
                merge_into(&mut uploads, base, nested);
            }
            None => {
                uploads.insert(key.clone(), value);
            }
        }
    }

    uploads
}

/// Split `name[a][b]` into `("name", ["a", "b"])`.
///
/// Empty segments (`[]`) are dropped. Returns `None` for keys without any
/// bracket group, or whose base name is empty.
#[must_use]
pub fn bracket_segments(key: &str) -> Option<(String, Vec<String>)> {
    let open = key.find('[')?;
    let base = &key[..open];
    if base.is_empty() {
        return None;
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut inside = false;
    for c in key[open..].chars() {
        match c {
            '[' => {
                inside = true;
                current.clear();
            }
            ']' if inside => {
                inside = false;
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            _ if inside => current.push(c),
            _ => {}
        }
    }

    Some((base.to_string(), segments))
}

fn lookup_override<'a>(overrides: &'a UploadMap, key: &str) -> Option<&'a PathBuf> {
    overrides
        .get(key)
        .or_else(|| key.strip_suffix("[]").and_then(|k| overrides.get(k)))
}

fn merge_into(target: &mut Uploads, key: String, value: UploadValue) {
    let UploadValue::Nested(incoming) = value else {
        target.insert(key, value);
        return;
    };
    if let Some(UploadValue::Nested(existing)) = target.get_mut(&key) {
        for (child, inner) in incoming {
            merge_into(existing, child, inner);
        }
        return;
    }
    target.insert(key, UploadValue::Nested(incoming));
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
