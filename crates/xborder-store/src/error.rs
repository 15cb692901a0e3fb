//! Store error types.

use thiserror::Error;

/// Errors raised by a persistence collaborator.
///
/// Callers propagate these unchanged. Nothing in the workspace retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend failed while performing `operation`.
    #[error("store backend failed during {operation}: {message}")]
    Backend {
        /// The store operation that was running.
        operation: &'static str,
        /// Backend-provided detail.
        message: String,
    },

    /// A write referenced a row that does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of row, e.g. "processing location".
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A write would mutate a row that must stay immutable.
    #[error("rejected write: {0}")]
    Rejected(String),
}
