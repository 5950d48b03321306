//! Error types for citifix

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or out-of-range input, rejected before any mutation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Duplicate vote or missing vote on unvote
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Data directory not initialized at {0}. Run 'citifix init' first.")]
    NotInitialized(String),

    #[error("Data directory already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Error::NotFound(format!("{kind} {id}"))
    }

    /// Whether the failure was caused by the caller rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Conflict(_)
                | Error::Forbidden(_)
                | Error::Unauthenticated
                | Error::NotFound(_)
                | Error::InvalidStatus(_)
                | Error::InvalidCategory(_)
                | Error::InvalidRole(_)
        )
    }
}
