//! Hold'em game engine - cards, seats, betting and settlement.
//!
//! This module provides the per-table hand logic:
//! - Cards and a seedable deck
//! - Player state across hands
//! - Main pot and side pot partitioning
//! - Hand evaluation
//! - The betting round state machine and showdown
//! - Masked table snapshots

pub mod betting;
pub mod constants;
pub mod entities;
pub mod errors;
pub mod eval;
pub mod pot;
pub mod showdown;
pub mod table;
pub mod view;

pub use betting::TurnKey;
pub use entities::{Action, Card, Chips, Deck, Player, PlayerStatus, Rank, SeatIndex, Suit, TableId, UserId};
pub use errors::GameError;
pub use eval::{EvaluatedHand, HandCategory, HandStrength};
pub use pot::{Payout, Pot, SidePot};
pub use showdown::{HandSettlement, SeatStack, Winner};
pub use table::{BettingRound, CurrentHand, Table, TableStatus};
pub use view::{PlayerView, TableView};
