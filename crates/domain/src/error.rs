//! Domain error types.

use ledger::LedgerError;
use thiserror::Error;

/// Errors surfaced by the cart, aggregation and catalog services.
///
/// Every variant except `Internal` is an expected outcome the presentation
/// layer maps to a client error.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced record is absent or not owned by the caller.
    #[error("{0}")]
    NotFound(String),

    /// Input is out of range or a required field is missing.
    #[error("{0}")]
    Validation(String),

    /// A like or favorite already exists for the pair.
    #[error("{0}")]
    Conflict(String),

    /// No customer resolves for the presented principal.
    #[error("Authentication credentials were not provided or are invalid")]
    Unauthenticated,

    /// An unanticipated ledger failure.
    #[error("Internal error: {0}")]
    Internal(LedgerError),
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        DomainError::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        DomainError::Conflict(message.into())
    }
}

impl From<LedgerError> for DomainError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound { entity, .. } => {
                DomainError::NotFound(format!("{entity} not found"))
            }
            LedgerError::Conflict(message) => DomainError::Conflict(message),
            other => DomainError::Internal(other),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
