//! Error types for weighbill storage.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use weighbill_core::{BillId, ValidationError};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file or directory cannot be accessed, or another writer holds it.
    #[error("store unavailable at {}: {reason}", path.display())]
    StoreUnavailable {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// The file does not have the expected columns, or a row does not parse.
    #[error("corrupt store at {}: {reason}", path.display())]
    CorruptStore {
        /// File involved.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record ("bill", "item", "ledger", ...).
        entity: &'static str,
        /// The key that was looked up.
        id: String,
    },

    /// An item refers to a bill that does not exist.
    #[error("parent bill not found: {bill_id}")]
    ParentNotFound {
        /// The dangling foreign key.
        bill_id: BillId,
    },

    /// Field type or range validation failed.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// The file changed on disk between load and save.
    #[error("concurrent write detected on {}", path.display())]
    ConcurrentWriteConflict {
        /// File involved.
        path: PathBuf,
    },

    /// A row could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Build a `StoreUnavailable` error.
    pub fn unavailable(path: &Path, reason: impl Display) -> Self {
        Self::StoreUnavailable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Build a `CorruptStore` error.
    pub fn corrupt(path: &Path, reason: impl Display) -> Self {
        Self::CorruptStore {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Build a `NotFound` error.
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the same call may succeed if the caller retries later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::ConcurrentWriteConflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_path() {
        let err = StoreError::corrupt(Path::new("/data/acme/Bill.csv"), "missing column: total");
        assert_eq!(
            err.to_string(),
            "corrupt store at /data/acme/Bill.csv: missing column: total"
        );
    }

    #[test]
    fn retryable_errors() {
        assert!(StoreError::unavailable(Path::new("x"), "locked").is_retryable());
        assert!(StoreError::ConcurrentWriteConflict { path: "x".into() }.is_retryable());
        assert!(!StoreError::not_found("bill", 3).is_retryable());
    }

    #[test]
    fn validation_errors_convert() {
        let err: StoreError = ValidationError::single("rate", "must be a finite non-negative number").into();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert_eq!(err.to_string(), "invalid input: rate (must be a finite non-negative number)");
    }
}
