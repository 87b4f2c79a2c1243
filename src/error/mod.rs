//! Error types and handling for the sync core.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types.
//! - Supports `anyhow` integration for wrapping collaborator-surface failures
//!   (remote transport, editor invocation) without inventing new variants for
//!   every third-party failure mode.
//! - Most failures are captured into batch result objects rather than
//!   raised; only auth/transport failures at the start of a sync and
//!   config/parse errors that block a single operation are returned as
//!   `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for sync-core operations.
#[derive(Error, Debug)]
pub enum SltasksError {
    // === Remote errors ===
    /// Remote authentication failed (HTTP 401 or equivalent GraphQL code).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Remote rejected the operation as forbidden.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Remote resource (project, repository, issue) not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote rate limit exceeded.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Transport-level failure talking to the remote (DNS, TCP, TLS, timeout).
    #[error("transport error: {0}")]
    TransportFailed(String),

    /// The remote responded with a shape we don't understand.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    // === Local errors ===
    /// `sltasks.yml` failed validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A task file or filter expression could not be parsed.
    #[error("parse failed: {0}")]
    ParseFailed(String),

    /// Both sides of a synced task changed since the last sync.
    #[error("conflict on task {id}")]
    Conflict { id: String },

    /// The requested transition or operation is not valid from the task's
    /// current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A task with the given id does not exist in the store.
    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    /// Path escapes the project root or is otherwise unsafe to use as
    /// `task_root`.
    #[error("unsafe path: {path}")]
    UnsafePath { path: PathBuf },

    // === I/O / serialization ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped error for collaborator surfaces (HTTP client, editor process)
    /// during gradual integration.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SltasksError {
    /// Whether this error should abort a sync pass outright (raised)
    /// versus being captured into a per-item result.
    #[must_use]
    pub const fn aborts_sync(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed(_) | Self::TransportFailed(_) | Self::ConfigInvalid(_)
        )
    }

    /// CLI-facing exit code: 0 success, 1 user-facing failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        1
    }
}

/// Result type using `SltasksError`.
pub type Result<T> = std::result::Result<T, SltasksError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let err = SltasksError::TaskNotFound {
            id: "acme/proj#7".to_string(),
        };
        assert_eq!(err.to_string(), "task not found: acme/proj#7");
    }

    #[test]
    fn conflict_does_not_abort_sync() {
        let err = SltasksError::Conflict {
            id: "acme/proj#7".to_string(),
        };
        assert!(!err.aborts_sync());
    }

    #[test]
    fn auth_and_transport_abort_sync() {
        assert!(SltasksError::AuthFailed("bad token".into()).aborts_sync());
        assert!(SltasksError::TransportFailed("timeout".into()).aborts_sync());
        assert!(!SltasksError::NotFound("x".into()).aborts_sync());
    }
}
