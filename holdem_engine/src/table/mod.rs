//! Table runtime: one async actor per table and the registry in front of
//! them.
//!
//! ## Architecture
//!
//! Each table runs in its own Tokio task with an mpsc inbox. Player
//! actions, timeouts and scheduled starts all go through that inbox, so a
//! table's state only ever has one writer. The [`TableManager`] spawns the
//! actors, routes requests to them and rate limits player actions on the
//! way in.
//!
//! ## Example
//!
//! ```no_run
//! use holdem_engine::db::InMemoryTableRepository;
//! use holdem_engine::security::ActionRateLimiter;
//! use holdem_engine::table::{TableConfig, TableManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = TableManager::new(
//!         Arc::new(InMemoryTableRepository::new()),
//!         Arc::new(ActionRateLimiter::default()),
//!     );
//!     let table_id = manager.create_table(TableConfig::default()).await?;
//!     manager.add_player(table_id, 1, "alice", 0, 500).await?;
//!     manager.add_player(table_id, 2, "bob", 1, 500).await?;
//!     manager.start_game(table_id).await?;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod config;
pub mod errors;
pub mod manager;
pub mod messages;
pub mod timer;

pub use actor::{SettlementPolicy, TableActor, TableHandle};
pub use config::{GameType, TableConfig, TableSpeed};
pub use errors::TableError;
pub use manager::TableManager;
pub use messages::TableMessage;
pub use timer::ActionTimer;
