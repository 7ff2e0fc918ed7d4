//! Options for file finding
//!
//! [`FindOptions`] holds what the caller asked for. [`FindOptions::validate`]
//! turns it into an immutable [`SearchConfig`] with defaults resolved and
//! patterns compiled, failing before any traversal I/O on bad input.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::filter::{
    normalize_extension, EntryType, ExtensionFilter, FileFilter, FilterChain, NameFilter,
    RegexFilter, SizeFilter, TimeFilter, TypeFilter,
};
use super::output::OutputFormat;
use super::thread_pool::resolve_concurrency;
use crate::errors::{FindError, FindResult};
use crate::ignore::{absolute, IgnoreMatcher};

/// Slack subtracted from a "since" bound to absorb filesystem timestamp truncation
pub const SINCE_TOLERANCE: Duration = Duration::from_secs(2);

/// Options for configuring the file finding process
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Directory to search
    pub root: PathBuf,

    /// Allowed extensions (`go`, `.go`); empty means any
    pub extensions: Vec<String>,

    /// Substring the base name must contain
    pub name: Option<String>,

    /// Regular expression the base name must match
    pub regex: Option<String>,

    /// Which kinds of entries to report
    pub entry_type: EntryType,

    /// Inclusive and strict size bounds
    pub size: SizeFilter,

    /// Modified at or after
    pub after: Option<DateTime<Utc>>,

    /// Modified at or before
    pub before: Option<DateTime<Utc>>,

    /// Modified since; widened by [`SINCE_TOLERANCE`]
    pub since: Option<DateTime<Utc>>,

    /// Whether to include hidden entries
    pub include_hidden: bool,

    /// Maximum recursion depth (None for unlimited, 0 for the root's children only)
    pub max_depth: Option<usize>,

    /// Concurrent directory reads; 0 uses the number of CPUs
    pub concurrency: usize,

    /// Output encoding
    pub output: OutputFormat,

    /// Indent structured output
    pub pretty: bool,

    /// Whether to follow symbolic links
    pub follow_links: bool,

    /// Whether to read the project's ignore file
    pub respect_gitignore: bool,

    /// Additional ignore patterns
    pub ignore_patterns: Vec<String>,
}

impl FindOptions {
    /// Create a new FindOptions with default values
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("."),
            extensions: Vec::new(),
            name: None,
            regex: None,
            entry_type: EntryType::All,
            size: SizeFilter::default(),
            after: None,
            before: None,
            since: None,
            include_hidden: false,
            max_depth: None,
            concurrency: 0,
            output: OutputFormat::Text,
            pretty: false,
            follow_links: false,
            respect_gitignore: true,
            ignore_patterns: Vec::new(),
        }
    }

    /// Set the directory to search
    pub fn with_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.root = root.as_ref().to_path_buf();
        self
    }

    /// Restrict files to these extensions
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Require the base name to contain `name`
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Require the base name to match `regex`
    pub fn with_regex(mut self, regex: &str) -> Self {
        self.regex = Some(regex.to_string());
        self
    }

    /// Set which entry types are reported
    pub fn with_entry_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    /// Set size bounds
    pub fn with_size(mut self, size: SizeFilter) -> Self {
        self.size = size;
        self
    }

    /// Set the lower modification-time bound
    pub fn with_after(mut self, after: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self
    }

    /// Set the upper modification-time bound
    pub fn with_before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    /// Only report entries modified since `since`
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Set whether hidden entries are included
    pub fn with_include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Set the maximum depth to search
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the number of concurrent directory reads
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the output encoding
    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    /// Set whether structured output is indented
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set whether to follow symbolic links
    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Set whether the project's ignore file is read
    pub fn with_respect_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    /// Add ignore patterns on top of the ignore file
    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the options and resolve defaults.
    ///
    /// Checks the root, compiles the regex and ignore patterns and builds the
    /// filter chain. Reads the ignore file, but never the tree itself.
    pub fn validate(&self) -> FindResult<SearchConfig> {
        if self.root.as_os_str().is_empty() {
            return Err(FindError::EmptyRoot);
        }
        let root = absolute(&self.root);
        if !root.is_dir() {
            return Err(FindError::InvalidPath(self.root.clone()));
        }

        let filters = self.build_filters()?;

        let ignore = if self.respect_gitignore || !self.ignore_patterns.is_empty() {
            IgnoreMatcher::for_search_root(&root, self.respect_gitignore, &self.ignore_patterns)?
        } else {
            IgnoreMatcher::disabled()
        };

        Ok(SearchConfig {
            root,
            filters,
            ignore,
            include_hidden: self.include_hidden,
            max_depth: self.max_depth,
            concurrency: resolve_concurrency(self.concurrency),
            output: self.output,
            pretty: self.pretty,
            follow_links: self.follow_links,
        })
    }

    fn build_filters(&self) -> FindResult<FilterChain> {
        let mut chain = FilterChain::new();

        if self.entry_type != EntryType::All {
            chain = chain.with_filter(TypeFilter::new(self.entry_type));
        }
        if self.extensions.iter().any(|e| normalize_extension(e).is_some()) {
            chain = chain.with_filter(ExtensionFilter::new(&self.extensions));
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            chain = chain.with_filter(NameFilter::for_platform(name));
        }
        if let Some(pattern) = self.regex.as_deref().filter(|r| !r.is_empty()) {
            chain = chain.with_filter(RegexFilter::new(pattern)?);
        }
        if self.size.is_active() {
            chain = chain.with_filter(self.size);
        }

        let time = TimeFilter {
            after: self.lower_time_bound()?,
            before: self.before,
        };
        if time.is_active() {
            chain = chain.with_filter(time);
        }

        Ok(chain)
    }

    fn lower_time_bound(&self) -> FindResult<Option<DateTime<Utc>>> {
        let since = match self.since {
            Some(since) => {
                let slack = chrono::Duration::from_std(SINCE_TOLERANCE)
                    .map_err(|e| FindError::InvalidTime(e.to_string()))?;
                Some(since - slack)
            }
            None => None,
        };
        Ok(match (self.after, since) {
            (Some(a), Some(s)) => Some(a.max(s)),
            (a, s) => a.or(s),
        })
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Validated, immutable search configuration
#[derive(Debug)]
pub struct SearchConfig {
    /// Absolute search root
    pub root: PathBuf,
    /// Emission filters, in evaluation order
    pub filters: FilterChain,
    /// Subtree pruning
    pub ignore: IgnoreMatcher,
    pub include_hidden: bool,
    pub max_depth: Option<usize>,
    /// Resolved concurrency, always at least 1
    pub concurrency: usize,
    pub output: OutputFormat,
    pub pretty: bool,
    pub follow_links: bool,
}

impl SearchConfig {
    /// Whether children of a directory at `depth` may be recursed into
    pub fn may_descend(&self, depth: usize) -> bool {
        self.max_depth.map_or(true, |max| depth < max)
    }

    /// Human readable summary of the active filters
    pub fn describe_filters(&self) -> String {
        self.filters.description()
    }
}
