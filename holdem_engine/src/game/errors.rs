//! Engine error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::{Chips, SeatIndex};

/// Errors raised by the hand engine.
///
/// Everything except [`GameError::DeckExhausted`] and
/// [`GameError::InsufficientCards`] is a user error: the request is
/// rejected and table state is left untouched.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("deck exhausted")]
    DeckExhausted,
    #[error("need {requested} cards but only {remaining} remain")]
    InsufficientCards { requested: usize, remaining: usize },
    #[error("need ${required} but only ${available} available")]
    InsufficientChips { required: Chips, available: Chips },
    #[error("invalid amount ${amount}, minimum is ${minimum}")]
    InvalidAmount { amount: Chips, minimum: Chips },
    #[error("not your turn")]
    OutOfTurn,
    #[error("invalid action")]
    InvalidAction,
    #[error("table is full")]
    TableFull,
    #[error("seat {0} is taken")]
    SeatTaken(SeatIndex),
    #[error("seat {0} does not exist")]
    InvalidSeat(SeatIndex),
    #[error("need 2+ players with chips")]
    NotEnoughPlayers,
    #[error("buy-in ${amount} outside ${min}..=${max}")]
    BuyInOutOfRange { amount: Chips, min: Chips, max: Chips },
    #[error("user already seated")]
    UserAlreadySeated,
    #[error("user not seated")]
    UserNotSeated,
    #[error("no hand in progress")]
    NoHandInProgress,
    #[error("hand already in progress")]
    HandInProgress,
    #[error("previous hand is awaiting settlement")]
    SettlementPending,
}

impl GameError {
    /// Invariant violations that abort the hand instead of bouncing a
    /// single request.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeckExhausted | Self::InsufficientCards { .. })
    }
}
