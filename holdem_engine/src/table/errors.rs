use thiserror::Error;

use crate::db::errors::PersistenceError;
use crate::game::{
    entities::{TableId, UserId},
    errors::GameError,
};

/// Errors surfaced by the table registry and its actors.
#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("Table {0} is closed")]
    TableClosed(TableId),

    #[error("Too many actions from user {0}, slow down")]
    RateLimited(UserId),

    #[error("Invalid table config: {0}")]
    InvalidConfig(String),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl TableError {
    /// Whether the caller caused this and should hear about it, as opposed
    /// to a server-side failure.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            TableError::Game(e) => !e.is_fatal(),
            TableError::TableNotFound(_) | TableError::RateLimited(_) | TableError::InvalidConfig(_) => {
                true
            }
            TableError::TableClosed(_) | TableError::Persistence(_) => false,
        }
    }
}
