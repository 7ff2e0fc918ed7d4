//! Gitignore-style path exclusion
//!
//! A small subset of gitignore:
//!
//! - `node_modules/` excludes any directory named `node_modules`, and
//!   everything under `<root>/node_modules`.
//! - `*.tmp` is a shell glob matched against the base name. When it does not
//!   match, the pattern is also tried as a directory prefix (`build` excludes
//!   `<root>/build/...`).
//! - Blank lines and `#` comments are skipped. Negations (`!`) are not
//!   supported and are dropped. A leading `/` is stripped.
//!
//! Paths are evaluated relative to the project root: the nearest ancestor of
//! the search root that contains a `.git` entry, or the search root itself.
//! Any matching pattern excludes; there is no re-inclusion.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;
use log::debug;

use crate::errors::{FindError, FindResult};

/// Marker that identifies a project root
pub const PROJECT_MARKER: &str = ".git";

/// Ignore file read from the project root
pub const IGNORE_FILE: &str = ".gitignore";

#[derive(Debug, Clone)]
struct IgnorePattern {
    stem: String,
    dir_only: bool,
    glob: Option<Pattern>,
}

impl IgnorePattern {
    fn parse(raw: &str) -> FindResult<Option<Self>> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        if line.starts_with('!') {
            debug!("Skipping unsupported negated ignore pattern '{}'", line);
            return Ok(None);
        }

        let dir_only = line.ends_with('/');
        let stem = line.trim_start_matches('/').trim_end_matches('/').to_string();
        if stem.is_empty() {
            return Ok(None);
        }

        let glob = if dir_only {
            None
        } else {
            let compiled = Pattern::new(&stem).map_err(|e| FindError::PatternError {
                message: format!("Invalid ignore pattern '{}': {}", raw.trim(), e),
            })?;
            Some(compiled)
        };

        Ok(Some(Self { stem, dir_only, glob }))
    }

    fn is_match(&self, rel: &str, is_dir: bool) -> bool {
        let base = rel.rsplit('/').next().unwrap_or(rel);
        let under_stem = rel == self.stem || is_descendant(rel, &self.stem);

        match &self.glob {
            None => (is_dir && base == self.stem) || under_stem,
            Some(glob) => glob.matches(base) || is_descendant(rel, &self.stem),
        }
    }
}

fn is_descendant(rel: &str, stem: &str) -> bool {
    rel.len() > stem.len() + 1 && rel.starts_with(stem) && rel.as_bytes()[stem.len()] == b'/'
}

/// Decides whether a path is excluded by the loaded ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    root: PathBuf,
    patterns: Vec<IgnorePattern>,
}

impl IgnoreMatcher {
    /// Compile `patterns`, evaluated relative to `root`.
    ///
    /// A malformed glob is a hard error.
    pub fn new<I, S>(root: impl Into<PathBuf>, patterns: I) -> FindResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for raw in patterns {
            if let Some(pattern) = IgnorePattern::parse(raw.as_ref())? {
                compiled.push(pattern);
            }
        }
        Ok(Self {
            root: root.into(),
            patterns: compiled,
        })
    }

    /// Matcher that never excludes anything
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Discover the project root above `start`, read its ignore file when
    /// `read_ignore_file` is set, and append `extra` patterns.
    pub fn for_search_root(
        start: &Path,
        read_ignore_file: bool,
        extra: &[String],
    ) -> FindResult<Self> {
        let root = find_project_root(start);
        let mut lines = if read_ignore_file {
            read_ignore_lines(&root).map_err(|source| FindError::FilesystemError {
                path: root.join(IGNORE_FILE),
                source,
            })?
        } else {
            Vec::new()
        };
        lines.extend(extra.iter().cloned());

        let matcher = Self::new(root, lines)?;
        debug!(
            "Ignore matcher rooted at {} with {} patterns",
            matcher.root.display(),
            matcher.patterns.len()
        );
        Ok(matcher)
    }

    /// Whether any pattern is loaded. A disabled matcher never matches and
    /// callers can skip it entirely.
    pub fn enabled(&self) -> bool {
        !self.patterns.is_empty()
    }

    /// Root that patterns are relative to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` (absolute, or relative to the root) is excluded.
    pub fn is_match(&self, path: &Path, is_dir: bool) -> bool {
        if !self.enabled() {
            return false;
        }
        let rel = self.relative_slash_path(path);
        self.patterns.iter().any(|p| p.is_match(&rel, is_dir))
    }

    fn relative_slash_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Walk upward from `start` looking for a [`PROJECT_MARKER`]; fall back to
/// the absolute `start` path.
pub fn find_project_root(start: &Path) -> PathBuf {
    let start = absolute(start);
    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_MARKER).exists())
        .map(Path::to_path_buf)
        .unwrap_or(start)
}

/// Read raw pattern lines from the ignore file in `root`.
///
/// A missing file yields no lines.
pub fn read_ignore_lines(root: &Path) -> io::Result<Vec<String>> {
    match fs::read_to_string(root.join(IGNORE_FILE)) {
        Ok(content) => Ok(content.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
