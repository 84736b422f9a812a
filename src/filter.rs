//! File admission by extension, filename and ignore pattern.
//!
//! Matching is deliberately literal. An ignore pattern excludes a path when
//! the path starts with it or when it equals one of the path's segments;
//! `build` therefore also excludes `buildx/tool.sh`.

use std::fmt;

use crate::ignorefile::IgnoreRules;

/// Extension suffixes excluded by default (binary, archive, media, bytecode).
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    ".pyc", ".tar", ".7z", ".zip", ".mp4", ".mp3", ".pdf", ".jpg", ".png", "tar.lz",
];

/// Basenames excluded by default.
pub const DEFAULT_EXCLUDED_FILES: &[&str] = &["license", "license.md", "license.txt", ".gitignore"];

/// Why a path was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Path ends with a deny-listed extension suffix.
    Extension(String),
    /// Final segment is a deny-listed filename.
    Filename(String),
    /// An ignore pattern matched.
    Pattern(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Extension(ext) => write!(f, "excluded extension {ext}"),
            RejectReason::Filename(name) => write!(f, "excluded filename {name}"),
            RejectReason::Pattern(pattern) => write!(f, "matches ignore pattern {pattern}"),
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    Accept,
    Reject(RejectReason),
}

impl FilterResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterResult::Accept)
    }
}

/// Deny-lists applied to every relative path.
#[derive(Debug, Clone)]
pub struct Filter {
    extensions: Vec<String>,
    filenames: Vec<String>,
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_EXCLUDED_FILES)
    }
}

impl Filter {
    /// Build a filter from extension suffixes and basenames.
    ///
    /// Both lists are compared case-insensitively.
    pub fn new<E, F>(extensions: E, filenames: F) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            filenames: filenames
                .into_iter()
                .map(|f| f.as_ref().to_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    /// Add a basename to the deny-list (used for the ignore file's own name).
    pub fn exclude_filename(mut self, name: &str) -> Self {
        let name = name.to_lowercase();
        if !name.is_empty() && !self.filenames.contains(&name) {
            self.filenames.push(name);
        }
        self
    }

    /// Check a `/`-separated relative path against the deny-lists and rules.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposnap::filter::{Filter, FilterResult};
    /// use reposnap::ignorefile::IgnoreRules;
    ///
    /// let filter = Filter::default();
    /// let rules = IgnoreRules::parse("vendor\n");
    ///
    /// assert!(filter.check("src/main.rs", &rules).is_accepted());
    /// assert!(!filter.check("vendor/lib.c", &rules).is_accepted());
    /// assert!(!filter.check("docs/LICENSE", &rules).is_accepted());
    /// ```
    pub fn check(&self, path: &str, rules: &IgnoreRules) -> FilterResult {
        let lowered = path.to_lowercase();

        if let Some(ext) = self.extensions.iter().find(|ext| lowered.ends_with(ext.as_str())) {
            return FilterResult::Reject(RejectReason::Extension(ext.clone()));
        }

        let basename = lowered.rsplit('/').next().unwrap_or_default();
        if let Some(name) = self.filenames.iter().find(|name| name.as_str() == basename) {
            return FilterResult::Reject(RejectReason::Filename(name.clone()));
        }

        let matched = rules
            .iter()
            .find(|pattern| path.starts_with(pattern) || path.split('/').any(|seg| seg == *pattern));
        if let Some(pattern) = matched {
            return FilterResult::Reject(RejectReason::Pattern(pattern.to_owned()));
        }

        FilterResult::Accept
    }

    /// True if `path` must be left out of the snapshot.
    pub fn is_ignored(&self, path: &str, rules: &IgnoreRules) -> bool {
        !self.check(path, rules).is_accepted()
    }
}

/// [`Filter::is_ignored`] with the default deny-lists.
pub fn is_ignored(path: &str, rules: &IgnoreRules) -> bool {
    Filter::default().is_ignored(path, rules)
}
