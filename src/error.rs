//! Error handling types for async-tagger
//!
//! Contract violations (mismatched snapshots, out-of-bounds ranges, unbalanced
//! acquire/release) and caught source failures share one error type so they
//! can be reported through the same sink.

use std::sync::PoisonError;
use thiserror::Error;

/// Comprehensive error type for tagging operations
#[derive(Debug, Error)]
pub enum TaggerError {
    /// Two operands belong to different buffers or snapshots
    #[error("Snapshot mismatch: expected {expected}, found {found}")]
    SnapshotMismatch { expected: String, found: String },

    /// Character range outside the bounds of its snapshot
    #[error("Invalid range {start}+{len} for snapshot of length {snapshot_len}")]
    InvalidRange {
        start: usize,
        len: usize,
        snapshot_len: usize,
    },

    /// Line range outside the bounds of its snapshot, or empty
    #[error("Invalid line range {start_line}+{count} for snapshot with {line_count} lines")]
    InvalidLineRange {
        start_line: usize,
        count: usize,
        line_count: usize,
    },

    /// Text changes that overlap or are not in ascending order
    #[error("Invalid edit: {message}")]
    InvalidEdit { message: String },

    /// Release without a matching acquire
    #[error("Unbalanced release for {key}")]
    UnbalancedRelease { key: String },

    /// Registry slot already holds an instance of another type
    #[error("Registry entry {key} holds a different type")]
    ScopeTypeMismatch { key: String },

    /// Tag source callback returned an error
    #[error("Tag source failed during {operation}: {message}")]
    Source { operation: String, message: String },

    /// Tag source callback panicked
    #[error("Tag source panicked during {operation}")]
    Panicked { operation: String },

    /// No tokio runtime available to schedule background work
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for tagging operations
pub type TaggerResult<T> = Result<T, TaggerError>;

/// Helper trait to convert PoisonError to TaggerError
pub trait LockResultExt<T> {
    /// Convert a PoisonError to TaggerError with recovery and logging.
    ///
    /// The context parameter identifies which operation triggered lock recovery,
    /// helping developers debug thread safety issues.
    fn recover_poison(self, context: &str) -> Result<T, TaggerError>;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> Result<T, TaggerError> {
        match self {
            Ok(guard) => Ok(guard),
            Err(poisoned) => {
                log::warn!(
                    target: "async_tagger::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                Ok(poisoned.into_inner())
            }
        }
    }
}

/// Helper functions for common error patterns
impl TaggerError {
    /// Create a snapshot mismatch error
    pub fn snapshot_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        TaggerError::SnapshotMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Create an invalid edit error
    pub fn invalid_edit(message: impl Into<String>) -> Self {
        TaggerError::InvalidEdit {
            message: message.into(),
        }
    }

    /// Create an unbalanced release error
    pub fn unbalanced_release(key: impl ToString) -> Self {
        TaggerError::UnbalancedRelease {
            key: key.to_string(),
        }
    }

    /// Create a registry type mismatch error
    pub fn scope_type_mismatch(key: impl ToString) -> Self {
        TaggerError::ScopeTypeMismatch {
            key: key.to_string(),
        }
    }

    /// Create a source failure error
    pub fn source(operation: impl Into<String>, message: impl Into<String>) -> Self {
        TaggerError::Source {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a source panic error
    pub fn panicked(operation: impl Into<String>) -> Self {
        TaggerError::Panicked {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        TaggerError::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        TaggerError::Internal(message.into())
    }

    /// True for errors that signal a caller bug rather than a runtime failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            TaggerError::SnapshotMismatch { .. }
                | TaggerError::InvalidRange { .. }
                | TaggerError::InvalidLineRange { .. }
                | TaggerError::InvalidEdit { .. }
                | TaggerError::UnbalancedRelease { .. }
                | TaggerError::ScopeTypeMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn recover_poison_returns_inner_guard() {
        let lock = Arc::new(Mutex::new(7));
        let clone = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let guard = lock.lock().recover_poison("test").unwrap();
        assert_eq!(*guard, 7);
    }

    #[test]
    fn contract_violations_are_classified() {
        assert!(TaggerError::unbalanced_release("k").is_contract_violation());
        assert!(TaggerError::snapshot_mismatch("a", "b").is_contract_violation());
        assert!(!TaggerError::source("extract", "boom").is_contract_violation());
        assert!(!TaggerError::panicked("compute").is_contract_violation());
    }
}
