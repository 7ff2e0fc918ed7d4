//! File filtering functionality
//!
//! This module provides filters for matching entries based on various criteria.
//! Filters decide emission only; they never prune recursion.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::Metadata;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::entry::Entry;
use crate::errors::FindError;

/// Trait for entry filters
pub trait FileFilter {
    /// Check if the entry matches the filter
    fn matches(&self, entry: &Entry) -> bool;

    /// Get the filter description
    fn description(&self) -> String;
}

/// Ordered set of filters, all of which must match.
///
/// Evaluation stops at the first filter that rejects the entry.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn FileFilter + Send + Sync>>,
}

impl FilterChain {
    /// Create an empty chain, which matches everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; filters run in insertion order
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: FileFilter + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl FileFilter for FilterChain {
    fn matches(&self, entry: &Entry) -> bool {
        self.filters.iter().all(|filter| filter.matches(entry))
    }

    fn description(&self) -> String {
        if self.filters.is_empty() {
            return "matches everything".to_string();
        }
        self.filters
            .iter()
            .map(|f| f.description())
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.description())
            .finish()
    }
}

/// Which kinds of entries are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryType {
    /// Anything that is not a directory
    Files,
    /// Directories only
    Directories,
    /// Both files and directories
    #[default]
    All,
}

impl FromStr for EntryType {
    type Err = FindError;

    fn from_str(type_code: &str) -> Result<Self, Self::Err> {
        match type_code {
            "f" | "file" | "files" => Ok(EntryType::Files),
            "d" | "dir" | "dirs" => Ok(EntryType::Directories),
            "a" | "all" => Ok(EntryType::All),
            _ => Err(FindError::InvalidFileType(type_code.to_string())),
        }
    }
}

/// Filter for matching entry types
pub struct TypeFilter {
    entry_type: EntryType,
}

impl TypeFilter {
    /// Create a new TypeFilter
    pub fn new(entry_type: EntryType) -> Self {
        Self { entry_type }
    }
}

impl FileFilter for TypeFilter {
    fn matches(&self, entry: &Entry) -> bool {
        match self.entry_type {
            EntryType::Files => !entry.is_dir,
            EntryType::Directories => entry.is_dir,
            EntryType::All => true,
        }
    }

    fn description(&self) -> String {
        match self.entry_type {
            EntryType::Files => "is a file".to_string(),
            EntryType::Directories => "is a directory".to_string(),
            EntryType::All => "is any entry".to_string(),
        }
    }
}

/// Filter on file extension. Directories always pass.
pub struct ExtensionFilter {
    allowed: HashSet<String>,
}

impl ExtensionFilter {
    /// Create a filter from extensions given as `go`, `.go` or `.GO`
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        Self { allowed }
    }
}

/// Lowercase and dot-prefix an extension; blank input yields `None`.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext == "." {
        return None;
    }
    if ext.starts_with('.') {
        Some(ext)
    } else {
        Some(format!(".{ext}"))
    }
}

impl FileFilter for ExtensionFilter {
    fn matches(&self, entry: &Entry) -> bool {
        if entry.is_dir || self.allowed.is_empty() {
            return true;
        }
        entry
            .extension()
            .map_or(false, |ext| self.allowed.contains(&ext))
    }

    fn description(&self) -> String {
        let mut exts: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
        exts.sort_unstable();
        format!("extension in [{}]", exts.join(", "))
    }
}

/// Substring match on the base name
pub struct NameFilter {
    needle: String,
    ignore_case: bool,
}

impl NameFilter {
    /// Create a case-sensitive NameFilter
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.to_string(),
            ignore_case: false,
        }
    }

    /// Create a case-insensitive NameFilter
    pub fn new_ignore_case(needle: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
            ignore_case: true,
        }
    }

    /// Case sensitivity follows the platform's filename convention.
    pub fn for_platform(needle: &str) -> Self {
        if cfg!(any(windows, target_os = "macos")) {
            Self::new_ignore_case(needle)
        } else {
            Self::new(needle)
        }
    }
}

impl FileFilter for NameFilter {
    fn matches(&self, entry: &Entry) -> bool {
        if self.ignore_case {
            entry.name.to_lowercase().contains(&self.needle)
        } else {
            entry.name.contains(&self.needle)
        }
    }

    fn description(&self) -> String {
        if self.ignore_case {
            format!("name (ignore case) contains '{}'", self.needle)
        } else {
            format!("name contains '{}'", self.needle)
        }
    }
}

/// Regular expression on the base name
pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    /// Compile `pattern`; an invalid pattern is a configuration error
    pub fn new(pattern: &str) -> Result<Self, FindError> {
        let regex = Regex::new(pattern).map_err(|source| FindError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }
}

impl FileFilter for RegexFilter {
    fn matches(&self, entry: &Entry) -> bool {
        self.regex.is_match(&entry.name)
    }

    fn description(&self) -> String {
        format!("name matches /{}/", self.regex.as_str())
    }
}

/// Size bounds in bytes. Directories always pass.
///
/// `min`/`max` are inclusive, `larger`/`smaller` are strict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeFilter {
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub larger: Option<u64>,
    pub smaller: Option<u64>,
}

impl SizeFilter {
    /// Whether any bound is set
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some() || self.larger.is_some() || self.smaller.is_some()
    }
}

impl FileFilter for SizeFilter {
    fn matches(&self, entry: &Entry) -> bool {
        if entry.is_dir {
            return true;
        }
        let size = entry.size;
        self.min.map_or(true, |min| size >= min)
            && self.max.map_or(true, |max| size <= max)
            && self.larger.map_or(true, |n| size > n)
            && self.smaller.map_or(true, |n| size < n)
    }

    fn description(&self) -> String {
        let mut parts = Vec::new();
        if let Some(n) = self.min {
            parts.push(format!(">= {n}"));
        }
        if let Some(n) = self.larger {
            parts.push(format!("> {n}"));
        }
        if let Some(n) = self.max {
            parts.push(format!("<= {n}"));
        }
        if let Some(n) = self.smaller {
            parts.push(format!("< {n}"));
        }
        format!("size {} bytes", parts.join(" and "))
    }
}

/// Inclusive modification-time bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeFilter {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl TimeFilter {
    pub fn is_active(&self) -> bool {
        self.after.is_some() || self.before.is_some()
    }
}

impl FileFilter for TimeFilter {
    fn matches(&self, entry: &Entry) -> bool {
        self.after.map_or(true, |after| entry.mod_time >= after)
            && self.before.map_or(true, |before| entry.mod_time <= before)
    }

    fn description(&self) -> String {
        match (self.after, self.before) {
            (Some(a), Some(b)) => format!("modified between {} and {}", a.to_rfc3339(), b.to_rfc3339()),
            (Some(a), None) => format!("modified at or after {}", a.to_rfc3339()),
            (None, Some(b)) => format!("modified at or before {}", b.to_rfc3339()),
            (None, None) => "modified at any time".to_string(),
        }
    }
}

/// Whether the platform convention marks an entry hidden.
#[cfg(not(windows))]
pub fn is_hidden(name: &OsStr, _metadata: &Metadata) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Whether the platform convention marks an entry hidden.
#[cfg(windows)]
pub fn is_hidden(_name: &OsStr, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}
