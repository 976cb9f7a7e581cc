//! # Hold'em Engine
//!
//! The per-table core of a multiplayer Texas Hold'em server.
//!
//! A [`game::Table`] drives one hand at a time from the deal to showdown:
//! blinds, turn order, legal actions, side pots under multiple all-ins,
//! hand evaluation and the odd-chip rule. Finished hands are handed off as
//! settlements and only paid out once persistence confirms them, so a
//! crash can't pay a hand twice or leave it half paid.
//!
//! ## Core Modules
//!
//! - [`game`]: Cards, players, pots, the evaluator and the betting state machine
//! - [`table`]: Single-writer table actors, action timeouts and the table registry
//! - [`security`]: Per-user action rate limiting
//! - [`db`]: Table snapshots, hand records and the idempotent chip ledger
//! - [`recovery`]: Rebuilding tables at startup
//!
//! ## Example
//!
//! ```
//! use holdem_engine::game::{Action, Deck, Table};
//! use holdem_engine::table::TableConfig;
//!
//! let mut table = Table::with_deck(1, TableConfig::default(), Deck::with_seed(7));
//! table.add_player(1, "alice", 0, 500).unwrap();
//! table.add_player(2, "bob", 1, 500).unwrap();
//! table.start_game().unwrap();
//!
//! // Heads-up, the button posts the small blind and acts first.
//! let first = table.hand().and_then(|h| h.current_turn).unwrap();
//! let user = table.players().find(|p| p.seat == first).unwrap().user_id;
//! table.apply_action(user, Action::Fold).unwrap();
//! assert!(table.pending_settlement().is_some());
//! ```

/// Persistence: repository trait, PostgreSQL and in-memory backends.
pub mod db;

/// Core game logic and entities.
pub mod game;
pub use game::{
    Action, Card, Deck, GameError, Player, Table, TableView,
    constants::{self, MAX_PLAYERS},
};

/// Startup recovery of persisted tables.
pub mod recovery;
pub use recovery::{RecoveryConfig, RecoveryError, RecoveryReport, recover_tables};

/// Abuse protection for inbound actions.
pub mod security;

/// Table actors and the table registry.
pub mod table;
pub use table::{TableConfig, TableError, TableManager};
