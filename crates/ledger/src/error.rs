use thiserror::Error;

/// Errors that can occur when interacting with the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A write would break a uniqueness or referential rule.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl LedgerError {
    /// Builds a `NotFound` error for the given record kind and identifier.
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
