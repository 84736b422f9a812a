//! Depth-limited directory traversal into a [`Snapshot`].
//!
//! Uses the `ignore` crate's walker with all of its own filtering turned
//! off; exclusion is decided only by the root ignore file and the
//! [`Filter`] deny-lists. Ignored and too-deep directories are pruned
//! before they are listed, so their contents are never read.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::{DirEntry, WalkBuilder};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{Config, Limits};
use crate::filter::{Filter, FilterResult, RejectReason};
use crate::ignorefile::{self, IgnoreRules, DEFAULT_IGNORE_FILE};
use crate::snapshot::Snapshot;

/// Errors that abort collection of a whole repository.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Number of `/`-separated segments in a relative path.
///
/// The root (`""`) has depth 1, as does every entry directly below it.
///
/// ```
/// use reposnap::walker::depth;
///
/// assert_eq!(depth(""), 1);
/// assert_eq!(depth("src"), 1);
/// assert_eq!(depth("src/bin"), 2);
/// ```
pub fn depth(relative: &str) -> usize {
    relative.split('/').count()
}

/// Why a file is absent from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Filtered(RejectReason),
    TooLarge { size: u64, limit: u64 },
    TooManyLines { lines: usize, limit: usize },
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Filtered(reason) => write!(f, "{reason}"),
            SkipReason::TooLarge { size, limit } => write!(f, "{size} bytes exceeds {limit}"),
            SkipReason::TooManyLines { lines, limit } => write!(f, "{lines} lines exceeds {limit}"),
            SkipReason::Unreadable(message) => write!(f, "read failed: {message}"),
        }
    }
}

/// A file seen during the walk but left out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Outcome of one collection pass.
#[derive(Debug, Default)]
pub struct Collection {
    pub snapshot: Snapshot,
    /// Skipped files in walk order.
    pub skipped: Vec<SkippedFile>,
}

/// Collects a bounded snapshot of a repository.
///
/// # Examples
///
/// ```no_run
/// use reposnap::walker::Collector;
///
/// let collection = Collector::new().max_depth(3).collect("./project").unwrap();
/// for (path, content) in collection.snapshot.iter() {
///     println!("{path}: {} bytes", content.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Collector {
    limits: Limits,
    filter: Filter,
    ignore_file: String,
    vcs_dir: String,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            filter: Filter::default(),
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
            vcs_dir: ".git".to_string(),
        }
    }
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector using the limits and deny-lists from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            limits: config.limits,
            filter: config.filter(),
            ignore_file: config.ignore_file.clone(),
            vcs_dir: config.vcs_dir.clone(),
        }
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.limits.max_depth = depth;
        self
    }

    pub fn max_lines(mut self, lines: usize) -> Self {
        self.limits.max_lines = lines;
        self
    }

    pub fn max_bytes(mut self, bytes: u64) -> Self {
        self.limits.max_bytes = bytes;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn current_limits(&self) -> Limits {
        self.limits
    }

    /// Walk `root` and gather every admitted file.
    ///
    /// Only a missing, non-directory or unlistable root is an error. Per-file problems
    /// are logged and reported in [`Collection::skipped`].
    pub fn collect(&self, root: impl AsRef<Path>) -> Result<Collection, WalkError> {
        let root = root.as_ref();
        let metadata = std::fs::metadata(root).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WalkError::NotFound {
                path: root.to_path_buf(),
            },
            _ => WalkError::Io {
                path: root.to_path_buf(),
                source: e,
            },
        })?;
        if !metadata.is_dir() {
            return Err(WalkError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        // An unlistable root fails the repository; unlistable sub-directories are only logged.
        std::fs::read_dir(root).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => WalkError::PermissionDenied {
                path: root.to_path_buf(),
            },
            _ => WalkError::Io {
                path: root.to_path_buf(),
                source: e,
            },
        })?;

        let rules = Arc::new(ignorefile::load(root, &self.ignore_file));
        let mut collection = Collection::default();

        if depth("") >= self.limits.max_depth {
            tracing::debug!(root = %root.display(), max_depth = self.limits.max_depth, "root is beyond depth limit");
            return Ok(collection);
        }

        let candidates = self.walk_candidates(root, &rules, &mut collection.skipped);

        let reads: Vec<(String, Result<String, SkipReason>)> = candidates
            .into_par_iter()
            .map(|(relative, path)| {
                let result = read_admitted(&path, &self.limits);
                (relative, result)
            })
            .collect();

        for (relative, result) in reads {
            match result {
                Ok(content) => {
                    collection.snapshot.insert(relative, content);
                }
                Err(reason) => {
                    match &reason {
                        SkipReason::Unreadable(_) => {
                            tracing::error!(path = %relative, %reason, "error reading file");
                        }
                        _ => tracing::info!(path = %relative, %reason, "skipping file"),
                    }
                    collection.skipped.push(SkippedFile { path: relative, reason });
                }
            }
        }

        tracing::debug!(
            root = %root.display(),
            files = collection.snapshot.len(),
            skipped = collection.skipped.len(),
            "collected snapshot"
        );
        Ok(collection)
    }

    /// Walk the pruned tree and return files that pass the path filter.
    fn walk_candidates(
        &self,
        root: &Path,
        rules: &Arc<IgnoreRules>,
        skipped: &mut Vec<SkippedFile>,
    ) -> Vec<(String, PathBuf)> {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b));

        let prune_root = root.to_path_buf();
        let prune_rules = Arc::clone(rules);
        let prune_filter = self.filter.clone();
        let vcs_dir = self.vcs_dir.clone();
        let max_depth = self.limits.max_depth;

        builder.filter_entry(move |entry| {
            if entry.depth() == 0 || !is_dir(entry) {
                return true;
            }
            if entry.file_name() == vcs_dir.as_str() {
                return false;
            }
            let relative = relative_path(&prune_root, entry.path());
            if let FilterResult::Reject(reason) = prune_filter.check(&relative, &prune_rules) {
                tracing::debug!(path = %relative, %reason, "pruning directory");
                return false;
            }
            if depth(&relative) >= max_depth {
                tracing::debug!(path = %relative, max_depth, "directory beyond depth limit");
                return false;
            }
            true
        });

        let mut candidates = Vec::new();

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %root.display(), error = %e, "walk error");
                    continue;
                }
            };
            if entry.depth() == 0 || is_dir(&entry) {
                continue;
            }

            // Symlinks are followed here so a link to a file is read like a file.
            match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_dir() => continue,
                _ => {}
            }

            let relative = relative_path(root, entry.path());
            match self.filter.check(&relative, rules) {
                FilterResult::Accept => candidates.push((relative, entry.into_path())),
                FilterResult::Reject(reason) => {
                    tracing::debug!(path = %relative, %reason, "ignoring file");
                    skipped.push(SkippedFile {
                        path: relative,
                        reason: SkipReason::Filtered(reason),
                    });
                }
            }
        }

        candidates
    }
}

/// Collect `root` with default limits and deny-lists.
pub fn collect(root: impl AsRef<Path>) -> Result<Snapshot, WalkError> {
    Collector::default().collect(root).map(|c| c.snapshot)
}

fn is_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|ft| ft.is_dir())
}

/// `path` below `root` with `/` separators; `""` for the root itself.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Lines as a universal-newline reader would yield them: `\n`, `\r\n` and a
/// bare `\r` each end a line, and an unterminated last line still counts.
fn count_lines(content: &str) -> usize {
    let bytes = content.as_bytes();
    let crlf = bytes.windows(2).filter(|w| w[0] == b'\r' && w[1] == b'\n').count();
    let breaks = bytecount::count(bytes, b'\n') + bytecount::count(bytes, b'\r') - crlf;
    if content.is_empty() || content.ends_with('\n') || content.ends_with('\r') {
        breaks
    } else {
        breaks + 1
    }
}

/// Stat, then read, a single file against the size and line limits.
fn read_admitted(path: &Path, limits: &Limits) -> Result<String, SkipReason> {
    let size = std::fs::metadata(path)
        .map_err(|e| SkipReason::Unreadable(e.to_string()))?
        .len();
    if size > limits.max_bytes {
        return Err(SkipReason::TooLarge {
            size,
            limit: limits.max_bytes,
        });
    }

    // Bounded read: a file that grew after the stat is still rejected.
    let mut bytes = Vec::with_capacity(size as usize);
    std::fs::File::open(path)
        .and_then(|file| file.take(limits.max_bytes.saturating_add(1)).read_to_end(&mut bytes))
        .map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    if bytes.len() as u64 > limits.max_bytes {
        return Err(SkipReason::TooLarge {
            size: bytes.len() as u64,
            limit: limits.max_bytes,
        });
    }
    let content = String::from_utf8(bytes).map_err(|e| SkipReason::Unreadable(e.to_string()))?;

    let lines = count_lines(&content);
    if lines > limits.max_lines {
        return Err(SkipReason::TooManyLines {
            lines,
            limit: limits.max_lines,
        });
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn create_test_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        write(root, ".git/config", "[core]\n");
        write(root, "README.md", "# Demo\n\nLine three\nLine four\nLine five\n");
        write(root, "LICENSE", "MIT\n");
        write(root, "notes.bin.zip", "PK");
        write(root, "src/main.rs", "fn main() {}\n");
        write(root, "src/nested/deep.rs", "pub fn deep() {}\n");
        write(root, ".gitignore", "# deps\nvendor\n");
        for i in 0..50 {
            write(root, &format!("vendor/file{i}.c"), "int x;\n");
        }

        dir
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth(""), 1);
        assert_eq!(depth("a"), 1);
        assert_eq!(depth("a/b"), 2);
        assert_eq!(depth("a/b/c.txt"), 3);
    }

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("one"), 1);
        assert_eq!(count_lines("one\n"), 1);
        assert_eq!(count_lines("one\ntwo"), 2);
        assert_eq!(count_lines("one\r\ntwo\r\n"), 2);
        assert_eq!(count_lines("\n\n"), 2);
    }

    #[test]
    fn test_count_lines_bare_carriage_return() {
        assert_eq!(count_lines("a\rb\rc"), 3);
        assert_eq!(count_lines("a\r"), 1);
        assert_eq!(count_lines("a\r\nb\rc\n"), 3);
        assert_eq!(count_lines("\r\r"), 2);
    }

    #[test]
    fn test_read_admitted_limits() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "ten.txt", "0123456789");
        let path = dir.path().join("ten.txt");

        let exact = Limits {
            max_bytes: 10,
            ..Limits::default()
        };
        assert_eq!(read_admitted(&path, &exact).unwrap(), "0123456789");

        let short = Limits {
            max_bytes: 9,
            ..Limits::default()
        };
        assert_eq!(
            read_admitted(&path, &short),
            Err(SkipReason::TooLarge { size: 10, limit: 9 })
        );
    }

    #[test]
    fn test_bare_carriage_return_lines_count_toward_limit() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "mac.txt", "x\r".repeat(3));

        let collection = Collector::new().max_lines(2).collect(dir.path()).unwrap();
        assert!(!collection.snapshot.contains("mac.txt"));
        assert!(collection.skipped.contains(&SkippedFile {
            path: "mac.txt".into(),
            reason: SkipReason::TooManyLines { lines: 3, limit: 2 },
        }));
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(root, Path::new("/repo")), "");
        assert_eq!(relative_path(root, Path::new("/repo/src/lib.rs")), "src/lib.rs");
    }

    #[test]
    fn test_collect_scenario() {
        let dir = create_test_repo();
        let snapshot = collect(dir.path()).unwrap();

        assert_eq!(
            snapshot.get("README.md"),
            Some("# Demo\n\nLine three\nLine four\nLine five\n")
        );
        assert!(snapshot.contains("src/main.rs"));
        assert!(!snapshot.contains("LICENSE"));
        assert!(!snapshot.contains("notes.bin.zip"));
        assert!(!snapshot.contains(".gitignore"));
        assert!(!snapshot.paths().any(|p| p.starts_with(".git/")));
        assert!(!snapshot.paths().any(|p| p.starts_with("vendor")));
        assert!(!snapshot.contains("src/nested/deep.rs"));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_pruned_directories_are_not_listed() {
        let dir = create_test_repo();
        let collection = Collector::new().collect(dir.path()).unwrap();

        // Pruned directories never show up as per-file skips.
        assert!(!collection.skipped.iter().any(|s| s.path.starts_with("vendor/")));
        assert!(!collection.skipped.iter().any(|s| s.path.starts_with(".git/")));
        assert!(!collection.skipped.iter().any(|s| s.path.starts_with("src/nested/")));

        let license = collection.skipped.iter().find(|s| s.path == "LICENSE").unwrap();
        assert_eq!(
            license.reason,
            SkipReason::Filtered(RejectReason::Filename("license".into()))
        );
    }

    #[test]
    fn test_depth_pruning() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "top.txt", "top\n");
        write(dir.path(), "a/one.txt", "one\n");
        write(dir.path(), "a/b/c.txt", "deep\n");

        let snapshot = collect(dir.path()).unwrap();
        assert!(snapshot.contains("top.txt"));
        assert!(snapshot.contains("a/one.txt"));
        assert!(!snapshot.contains("a/b/c.txt"));

        let deeper = Collector::new().max_depth(3).collect(dir.path()).unwrap().snapshot;
        assert!(deeper.contains("a/b/c.txt"));
    }

    #[test]
    fn test_depth_one_yields_nothing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "top.txt", "top\n");

        let collection = Collector::new().max_depth(1).collect(dir.path()).unwrap();
        assert!(collection.snapshot.is_empty());
    }

    #[test]
    fn test_size_boundary() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "exact.txt", vec![b'a'; 1024]);
        write(dir.path(), "over.txt", vec![b'a'; 1025]);

        let collection = Collector::new().max_bytes(1024).collect(dir.path()).unwrap();
        assert!(collection.snapshot.contains("exact.txt"));
        assert!(!collection.snapshot.contains("over.txt"));
        assert!(collection.skipped.contains(&SkippedFile {
            path: "over.txt".into(),
            reason: SkipReason::TooLarge { size: 1025, limit: 1024 },
        }));
    }

    #[test]
    fn test_size_uses_bytes_not_chars() {
        let dir = TempDir::new().unwrap();
        // 4 characters, 8 bytes.
        write(dir.path(), "wide.txt", "éééé");

        let snapshot = Collector::new().max_bytes(4).collect(dir.path()).unwrap().snapshot;
        assert!(!snapshot.contains("wide.txt"));
    }

    #[test]
    fn test_default_size_limit() {
        let dir = TempDir::new().unwrap();
        let mut exact = "a".repeat(102_399);
        exact.push('\n');
        write(dir.path(), "exact.txt", &exact);
        write(dir.path(), "over.txt", "a".repeat(102_401));

        let snapshot = collect(dir.path()).unwrap();
        assert!(snapshot.contains("exact.txt"));
        assert!(!snapshot.contains("over.txt"));
    }

    #[test]
    fn test_line_boundary() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "exact.txt", "x\n".repeat(1000));
        write(dir.path(), "over.txt", "x\n".repeat(1001));
        // 1000 full lines plus an unterminated one.
        write(dir.path(), "partial.txt", format!("{}tail", "x\n".repeat(1000)));

        let collection = Collector::new().collect(dir.path()).unwrap();
        assert!(collection.snapshot.contains("exact.txt"));
        assert!(!collection.snapshot.contains("over.txt"));
        assert!(!collection.snapshot.contains("partial.txt"));
        assert!(collection.skipped.contains(&SkippedFile {
            path: "partial.txt".into(),
            reason: SkipReason::TooManyLines { lines: 1001, limit: 1000 },
        }));
    }

    #[test]
    fn test_line_endings_preserved() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "crlf.txt", "a\r\nb\r\n");
        write(dir.path(), "no_newline.txt", "last");

        let snapshot = collect(dir.path()).unwrap();
        assert_eq!(snapshot.get("crlf.txt"), Some("a\r\nb\r\n"));
        assert_eq!(snapshot.get("no_newline.txt"), Some("last"));
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.txt", "fine\n");
        write(dir.path(), "bad.txt", b"\xff\xfe\x00binary");

        let collection = Collector::new().collect(dir.path()).unwrap();
        assert!(collection.snapshot.contains("good.txt"));
        assert!(!collection.snapshot.contains("bad.txt"));

        let bad = collection.skipped.iter().find(|s| s.path == "bad.txt").unwrap();
        assert!(matches!(bad.reason, SkipReason::Unreadable(_)));
    }

    #[test]
    fn test_pattern_prunes_directory_and_prefix() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".gitignore", "build\n");
        write(dir.path(), "build/out.txt", "out\n");
        write(dir.path(), "buildx/tool.sh", "echo\n");
        write(dir.path(), "src/build", "file named build\n");
        write(dir.path(), "src/ok.rs", "ok\n");

        let snapshot = collect(dir.path()).unwrap();
        assert_eq!(snapshot.paths().collect::<Vec<_>>(), vec!["src/ok.rs"]);
    }

    #[test]
    fn test_hidden_files_are_kept() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".env.example", "KEY=\n");
        write(dir.path(), ".github/workflows.yml", "on: push\n");

        let snapshot = collect(dir.path()).unwrap();
        assert!(snapshot.contains(".env.example"));
        assert!(snapshot.contains(".github/workflows.yml"));
    }

    #[test]
    fn test_custom_ignore_file_from_config() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".snapignore", "fixtures\n");
        write(dir.path(), "fixtures/big.json", "{}\n");
        write(dir.path(), "main.py", "print(1)\n");

        let config = Config {
            ignore_file: ".snapignore".to_string(),
            ..Config::default()
        };
        let snapshot = Collector::from_config(&config).collect(dir.path()).unwrap().snapshot;

        assert_eq!(snapshot.paths().collect::<Vec<_>>(), vec!["main.py"]);
    }

    #[test]
    fn test_idempotent() {
        let dir = create_test_repo();
        let first = collect(dir.path()).unwrap();
        let second = collect(dir.path()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let result = collect(dir.path().join("missing"));
        assert!(matches!(result, Err(WalkError::NotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_unlistable_root_is_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        write(&locked, "main.rs", "fn main() {}\n");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not apply to root.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = collect(&locked);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(WalkError::PermissionDenied { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_unlistable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "top.txt", "top\n");
        write(dir.path(), "locked/inner.txt", "inner\n");
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let result = collect(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let snapshot = result.unwrap();
        assert!(snapshot.contains("top.txt"));
    }

    #[test]
    fn test_root_is_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "file.txt", "x");
        let result = collect(dir.path().join("file.txt"));
        assert!(matches!(result, Err(WalkError::NotADirectory { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_not_followed() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "secret.txt", "secret\n");
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        write(dir.path(), "main.rs", "fn main() {}\n");

        let snapshot = collect(dir.path()).unwrap();
        assert_eq!(snapshot.paths().collect::<Vec<_>>(), vec!["main.rs"]);
    }
}
