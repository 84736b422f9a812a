//! Error types for reposnap.

use std::path::PathBuf;

use crate::chat::ChatError;
use crate::walker::WalkError;

/// Top-level error type for reposnap operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("chat error: {0}")]
    Chat(#[from] ChatError),
}

impl From<figment::Error> for SnapError {
    fn from(e: figment::Error) -> Self {
        SnapError::Config(Box::new(e))
    }
}

/// Map an error to its exit code.
pub fn exit_code(error: &SnapError) -> i32 {
    match error {
        SnapError::PathNotFound(_) => 3,
        SnapError::PermissionDenied(_) => 4,
        SnapError::Io(_) => 1,
        SnapError::Walk(WalkError::NotFound { .. }) => 3,
        SnapError::Walk(WalkError::PermissionDenied { .. }) => 4,
        SnapError::Walk(_) => 2,
        SnapError::Config(_) => 6,
        SnapError::Serialize(_) => 1,
        SnapError::Chat(_) => 7,
    }
}
