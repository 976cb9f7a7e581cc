//! Table configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::{
    constants::{MAX_PLAYERS, MIN_PLAYERS_TO_START},
    entities::{Blinds, Chips},
};

/// Longest action timeout a table may be configured with.
pub const MAX_ACTION_TIMEOUT_SECS: u64 = 3_600;

/// Table speed variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSpeed {
    Normal,
    Turbo,
    Hyper,
}

impl std::fmt::Display for TableSpeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableSpeed::Normal => write!(f, "normal"),
            TableSpeed::Turbo => write!(f, "turbo"),
            TableSpeed::Hyper => write!(f, "hyper"),
        }
    }
}

/// Game variants a table can run. Only hold'em is dealt today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    TexasHoldem,
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameType::TexasHoldem => write!(f, "texas_holdem"),
        }
    }
}

/// Table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table name
    pub name: String,

    pub game_type: GameType,

    /// Number of seats (default: 10)
    pub max_players: usize,

    /// Players needed before a hand can be dealt (default: 2)
    pub min_players: usize,

    pub small_blind: Chips,

    pub big_blind: Chips,

    /// Smallest stack a player may sit down with
    pub min_buy_in: Chips,

    /// Largest stack a player may sit down with
    pub max_buy_in: Chips,

    /// Table speed, which sets the default action timeout
    pub speed: TableSpeed,

    /// Overrides the speed-derived action timeout when set
    pub action_timeout_secs: Option<u64>,

    /// Timeouts in a row before a player is sat out (default: 3)
    pub max_consecutive_timeouts: u32,

    /// Pause between a settled hand and the next one
    pub hand_interval_ms: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: "Default Table".to_string(),
            game_type: GameType::TexasHoldem,
            max_players: MAX_PLAYERS,
            min_players: MIN_PLAYERS_TO_START,
            small_blind: 5,
            big_blind: 10,
            min_buy_in: 200,
            max_buy_in: 1_000,
            speed: TableSpeed::Normal,
            action_timeout_secs: None,
            max_consecutive_timeouts: 3,
            hand_interval_ms: 3_000,
        }
    }
}

impl TableConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Table name must not be empty".to_string());
        }

        if self.small_blind == 0 {
            return Err("Small blind must be positive".to_string());
        }

        if self.big_blind <= self.small_blind {
            return Err("Big blind must be greater than small blind".to_string());
        }

        if self.max_buy_in < self.min_buy_in {
            return Err("Max buy-in must not be less than min buy-in".to_string());
        }

        if self.min_buy_in < self.big_blind {
            return Err("Min buy-in must cover at least one big blind".to_string());
        }

        if self.max_players < 2 || self.max_players > MAX_PLAYERS {
            return Err(format!("Max players must be between 2 and {MAX_PLAYERS}"));
        }

        if self.min_players < MIN_PLAYERS_TO_START || self.min_players > self.max_players {
            return Err(format!(
                "Min players must be between {MIN_PLAYERS_TO_START} and max players"
            ));
        }

        if let Some(secs) = self.action_timeout_secs
            && !(1..=MAX_ACTION_TIMEOUT_SECS).contains(&secs)
        {
            return Err(format!(
                "Action timeout must be between 1 and {MAX_ACTION_TIMEOUT_SECS} seconds"
            ));
        }

        if self.max_consecutive_timeouts == 0 {
            return Err("Max consecutive timeouts must be positive".to_string());
        }

        Ok(())
    }

    #[must_use]
    pub fn blinds(&self) -> Blinds {
        Blinds {
            small: self.small_blind,
            big: self.big_blind,
        }
    }

    /// Get action timeout based on table speed, capped at
    /// [`MAX_ACTION_TIMEOUT_SECS`].
    #[must_use]
    pub fn action_timeout_secs(&self) -> u64 {
        self.action_timeout_secs
            .unwrap_or(match self.speed {
                TableSpeed::Normal => 30,
                TableSpeed::Turbo => 15,
                TableSpeed::Hyper => 5,
            })
            .min(MAX_ACTION_TIMEOUT_SECS)
    }

    #[must_use]
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs())
    }

    #[must_use]
    pub fn hand_interval(&self) -> Duration {
        Duration::from_millis(self.hand_interval_ms)
    }
}
