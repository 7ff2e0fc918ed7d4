//! Matched filesystem entries and the metadata they are built from.

use std::ffi::OsStr;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// A matched file or directory.
///
/// Serialized field names are stable; they are the record shape of the
/// `json` and `ndjson` outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Absolute path of the entry
    #[serde(serialize_with = "serialize_lossy_path")]
    pub path: PathBuf,
    /// Base name
    pub name: String,
    /// Size in bytes (not meaningful for directories)
    pub size: u64,
    /// Platform permission/mode bits
    pub mode: u32,
    /// Last modification time
    pub mod_time: DateTime<Utc>,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

impl Entry {
    /// Build an entry from already-resolved metadata.
    pub fn from_metadata(path: PathBuf, name: &OsStr, metadata: &Metadata) -> Self {
        Self {
            name: name.to_string_lossy().into_owned(),
            size: metadata.len(),
            mode: mode_bits(metadata),
            mod_time: DateTime::<Utc>::from(metadata.modified().unwrap_or(UNIX_EPOCH)),
            is_dir: metadata.is_dir(),
            path,
        }
    }

    /// Lower-cased, dot-prefixed extension of the base name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
    }
}

fn serialize_lossy_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_string_lossy())
}

#[cfg(unix)]
pub(crate) fn mode_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    metadata.mode()
}

#[cfg(not(unix))]
pub(crate) fn mode_bits(metadata: &Metadata) -> u32 {
    let perm = if metadata.permissions().readonly() { 0o444 } else { 0o666 };
    if metadata.is_dir() {
        perm | 0o111
    } else {
        perm
    }
}

/// Physical identity of a directory, used to stop symlink cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DirIdentity {
    /// Device and inode number
    Inode { dev: u64, ino: u64 },
    /// Canonical path, on platforms without inode numbers
    Canonical(PathBuf),
}

#[cfg(unix)]
pub(crate) fn dir_identity(_path: &Path, metadata: &Metadata) -> Option<DirIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some(DirIdentity::Inode {
        dev: metadata.dev(),
        ino: metadata.ino(),
    })
}

// Canonical paths only dedupe what the OS resolves; hard-linked or
// junction-reached directories may still be visited twice.
#[cfg(not(unix))]
pub(crate) fn dir_identity(path: &Path, _metadata: &Metadata) -> Option<DirIdentity> {
    std::fs::canonicalize(path).ok().map(DirIdentity::Canonical)
}

#[cfg(test)]
pub(crate) fn test_entry(name: &str, size: u64, is_dir: bool, mod_time: DateTime<Utc>) -> Entry {
    Entry {
        path: PathBuf::from("/data").join(name),
        name: name.to_string(),
        size,
        mode: if is_dir { 0o755 } else { 0o644 },
        mod_time,
        is_dir,
    }
}
