use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ValidationError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, FlashcoreError>;

/// Every failure the scheduler, review processor, persistence layer and
/// session queue can surface.
///
/// Errors are returned unchanged to the caller and never retried. The only
/// failure that is logged instead of returned is a failed rollback, because the
/// error that triggered the rollback already describes the outcome.
#[derive(Error, Debug)]
pub enum FlashcoreError {
    #[error("Failed to connect to database at {location}: {source}")]
    Connection {
        location: String,
        #[source]
        source: diesel::ConnectionError,
    },
    #[error("Database at {location} is not available: {reason}")]
    StoreUnavailable { location: String, reason: String },
    #[error("Cannot {operation} in read-only mode")]
    ReadOnlyViolation { operation: &'static str },
    #[error("Constraint violated during {operation}: {message}")]
    ConstraintViolation {
        operation: &'static str,
        message: String,
    },
    #[error("Failed to reconstruct {entity} '{key}' from the database: {source}")]
    Marshalling {
        entity: &'static str,
        key: String,
        #[source]
        source: ValidationError,
    },
    #[error(
        "Card {card_uuid} is missing after a successful review commit; \
         the store is inconsistent"
    )]
    ConsistencyViolation { card_uuid: Uuid },
    #[error("Invalid rating: {0}. Must be 1-4 (1=Again, 2=Hard, 3=Good, 4=Easy)")]
    InvalidRating(i32),
    #[error("Cannot map memory-model state '{0}' to a card state")]
    UnmappableEngineState(String),
    #[error("Memory model failed: {0}")]
    MemoryModel(String),
    #[error("{operation} failed: {source}")]
    TransactionFailure {
        operation: &'static str,
        #[source]
        source: DieselError,
    },
    #[error("Card {0} not found in the current review session")]
    CardNotInSession(Uuid),
    #[error("Card {0} not found")]
    CardNotFound(Uuid),
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
    #[error("Refusing destructive schema operation: {reason}")]
    DestructiveOperationRefused { reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Schema migration failed: {0}")]
    Migration(String),
    #[error("Backup failed: {0}")]
    Backup(#[from] std::io::Error),
}

impl FlashcoreError {
    /// Wraps a storage error raised while running `operation`
    ///
    /// CHECK constraint failures are reported as `ConstraintViolation` so the
    /// caller can tell a rejected value from a broken store.
    pub fn storage(operation: &'static str, source: DieselError) -> Self {
        if let DieselError::DatabaseError(kind, info) = &source {
            let is_check = matches!(kind, DatabaseErrorKind::CheckViolation)
                || info.message().contains("CHECK constraint failed");
            if is_check {
                return FlashcoreError::ConstraintViolation {
                    operation,
                    message: info.message().to_string(),
                };
            }
        }
        FlashcoreError::TransactionFailure { operation, source }
    }

    /// Returns true for errors that indicate the store can no longer be trusted
    pub fn is_fatal(&self) -> bool {
        matches!(self, FlashcoreError::ConsistencyViolation { .. })
    }

    /// Returns true when the error was raised before any data was touched
    /// because the handle is read-only
    pub fn is_read_only_violation(&self) -> bool {
        matches!(self, FlashcoreError::ReadOnlyViolation { .. })
    }
}
