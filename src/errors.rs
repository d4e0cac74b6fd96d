//! Typed error hierarchy for the crackwise core.
//!
//! Propagation policy: errors local to one phase never abort a session.
//! Only `SpawnFailed` is surfaced synchronously to the caller of
//! `run_phase`; tool-probe failures become a `tool_unavailable` phase
//! outcome, timeouts become skips, and learning-store failures are logged
//! while the in-memory model keeps serving.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the orchestrator and its collaborators.
#[derive(Debug, Error)]
pub enum CrackError {
    #[error("Cracking tool not found or unusable")]
    ToolUnavailable,

    #[error("Failed to spawn cracking tool: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Orchestrator not initialized - call initialize() first")]
    NotInitialized,

    #[error("No active recovery session")]
    NoActiveSession,

    #[error("Failed to read learning store at {path}: {source}")]
    StoreReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write learning store at {path}: {source}")]
    StoreWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failed_is_matchable_and_keeps_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "hashcat not found");
        let err = CrackError::SpawnFailed(io_err);
        match &err {
            CrackError::SpawnFailed(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("Expected SpawnFailed variant"),
        }
    }

    #[test]
    fn store_errors_carry_their_path() {
        let path = PathBuf::from("/data/password_patterns.json");
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CrackError::StoreWriteFailed {
            path: path.clone(),
            source: io_err,
        };
        match &err {
            CrackError::StoreWriteFailed { path: p, source } => {
                assert_eq!(p, &path);
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            _ => panic!("Expected StoreWriteFailed"),
        }
        assert!(err.to_string().contains("password_patterns.json"));
    }

    #[test]
    fn all_variants_implement_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&CrackError::ToolUnavailable);
        assert_std_error(&CrackError::NoActiveSession);
        assert_std_error(&CrackError::NotInitialized);
    }
}
