//! Persistence error types.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::timeouts::TimeoutError;
use crate::game::entities::TableId;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("Hand {0} was cancelled and cannot be settled")]
    HandCancelled(Uuid),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<TimeoutError> for PersistenceError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(duration) => PersistenceError::Timeout(duration),
            TimeoutError::Database(e) => PersistenceError::Database(e),
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
