//! Root-level ignore file parsing.
//!
//! Only the ignore file sitting directly in the repository root is read.
//! Patterns are kept as literal strings; there is no glob, negation or
//! escaping support.

use std::path::Path;

/// Default name of the ignore file looked up in the repository root.
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";

/// Ordered set of literal ignore patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreRules {
    patterns: Vec<String>,
}

impl IgnoreRules {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse ignore file text.
    ///
    /// Lines starting with `#` are comments. Every other line is trimmed
    /// and kept if anything remains.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposnap::ignorefile::IgnoreRules;
    ///
    /// let rules = IgnoreRules::parse("# deps\nvendor\n\n  build/  \n");
    /// assert_eq!(rules.patterns(), ["vendor", "build/"]);
    /// ```
    pub fn parse(text: &str) -> Self {
        let patterns = text
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        Self { patterns }
    }

    /// Patterns in file order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreRules {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Load the ignore file named `file_name` from `root`.
///
/// A missing file yields an empty rule set. An unreadable file is logged
/// and also yields an empty rule set; this never fails.
pub fn load(root: &Path, file_name: &str) -> IgnoreRules {
    let path = root.join(file_name);

    match std::fs::read(&path) {
        Ok(bytes) => {
            let rules = IgnoreRules::parse(&String::from_utf8_lossy(&bytes));
            tracing::debug!(path = %path.display(), patterns = rules.len(), "loaded ignore file");
            rules
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => IgnoreRules::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read ignore file");
            IgnoreRules::new()
        }
    }
}
