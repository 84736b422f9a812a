//! Sequential review of every repository under one or more roots.
//!
//! Each repository is collected, handed to a [`SnapshotConsumer`] by value
//! and dropped before the next one starts. A failure in one repository or
//! root is reported and processing moves on.

use std::path::{Path, PathBuf};

use tracing::Level;

use crate::chat::{send_or_report, ChatMessage, ChatSink};
use crate::errors::SnapError;
use crate::snapshot::Snapshot;
use crate::tokens::Encoding;
use crate::walker::Collector;

/// Receives each completed snapshot and produces a textual result.
pub trait SnapshotConsumer {
    fn consume(&mut self, repository: &str, snapshot: Snapshot) -> Result<String, SnapError>;
}

/// Sends each snapshot to a chat sink as a single user message.
pub struct ChatReviewer<S> {
    sink: S,
    instruction: String,
}

impl<S: ChatSink> ChatReviewer<S> {
    pub fn new(sink: S, instruction: impl Into<String>) -> Self {
        Self {
            sink,
            instruction: instruction.into(),
        }
    }

    /// The user message sent for one repository.
    pub fn message(&self, repository: &str, snapshot: &Snapshot) -> Result<ChatMessage, SnapError> {
        let json = snapshot.to_json()?;
        Ok(ChatMessage::user(format!(
            "Repository: {repository}\n\n\
             Here is the file tree and contents of the repository:\n\n\
             {json}\n\n{}",
            self.instruction
        )))
    }
}

impl<S: ChatSink> SnapshotConsumer for ChatReviewer<S> {
    fn consume(&mut self, repository: &str, snapshot: Snapshot) -> Result<String, SnapError> {
        let message = self.message(repository, &snapshot)?;
        if tracing::enabled!(Level::INFO) {
            tracing::info!(
                repository,
                files = snapshot.len(),
                tokens = snapshot.token_estimate(Encoding::default()),
                "requesting review"
            );
        }
        drop(snapshot);
        Ok(send_or_report(&self.sink, &[message]))
    }
}

/// Result for one repository.
#[derive(Debug)]
pub struct RepoOutcome {
    /// Repository directory name, or the root path when the root itself failed.
    pub repository: String,
    pub path: PathBuf,
    pub result: Result<String, SnapError>,
}

/// Immediate sub-directories of `root`, sorted by name.
pub fn list_repositories(root: &Path) -> Result<Vec<PathBuf>, SnapError> {
    let entries = std::fs::read_dir(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => SnapError::PathNotFound(root.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => SnapError::PermissionDenied(root.to_path_buf()),
        _ => SnapError::Io(e),
    })?;

    let mut repositories = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.path().is_dir() {
            repositories.push(entry.path());
        }
    }
    repositories.sort();
    Ok(repositories)
}

/// Collect and consume every repository under each root, in order.
///
/// `on_outcome` is called as soon as each repository finishes; all
/// outcomes are also returned.
pub fn run_roots<C, F>(
    roots: &[PathBuf],
    collector: &Collector,
    consumer: &mut C,
    mut on_outcome: F,
) -> Vec<RepoOutcome>
where
    C: SnapshotConsumer + ?Sized,
    F: FnMut(&RepoOutcome),
{
    let mut outcomes = Vec::new();
    let mut report = |outcome: RepoOutcome| {
        on_outcome(&outcome);
        outcomes.push(outcome);
    };

    for root in roots {
        let repositories = match list_repositories(root) {
            Ok(repositories) => repositories,
            Err(e) => {
                tracing::error!(root = %root.display(), error = %e, "cannot list repositories");
                report(RepoOutcome {
                    repository: root.display().to_string(),
                    path: root.clone(),
                    result: Err(e),
                });
                continue;
            }
        };

        for path in repositories {
            let repository = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            tracing::info!(%repository, "processing repository");

            let result = collector
                .collect(&path)
                .map_err(SnapError::from)
                .and_then(|collection| consumer.consume(&repository, collection.snapshot));

            if let Err(e) = &result {
                tracing::error!(%repository, error = %e, "repository failed");
            }
            report(RepoOutcome {
                repository,
                path,
                result,
            });
        }
    }

    outcomes
}
