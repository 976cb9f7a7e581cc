//! Startup recovery: rebuilds tables from their last persisted snapshot.
//!
//! Runs once, before any live traffic. Hands that were in play when the
//! process stopped are cancelled rather than resumed, since the actions
//! that led to them aren't durable. The seat snapshot already holds the
//! stacks from before that hand, so cancelling it is the refund.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::{errors::PersistenceError, models::TableRecord, repository::TableRepository},
    game::{entities::TableId, table::Table},
    table::manager::TableManager,
};

#[derive(Debug, Error)]
pub enum RecoveryError {
    /// One table couldn't be rebuilt. The others still are.
    #[error("Table {table_id} could not be recovered: {reason}")]
    PartialFailure { table_id: TableId, reason: String },

    #[error("Failed to list tables: {0}")]
    Load(#[from] PersistenceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Time players get to reconnect before a recovered table deals
    pub grace_period: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(10),
        }
    }
}

impl RecoveryConfig {
    /// Defaults, with `RECOVERY_GRACE_SECS` overriding the grace period.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            grace_period: std::env::var("RECOVERY_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(defaults.grace_period, Duration::from_secs),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub recovered: Vec<TableId>,
    pub cancelled_hands: Vec<Uuid>,
    /// Tables that will start a hand once the grace period is over
    pub scheduled_starts: Vec<TableId>,
    pub failures: Vec<RecoveryError>,
}

impl RecoveryReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Rebuilds a table and its players from a snapshot.
pub fn rebuild_table(record: &TableRecord) -> Result<Table, RecoveryError> {
    let failure = |reason: String| RecoveryError::PartialFailure {
        table_id: record.table_id,
        reason,
    };

    record.config.validate().map_err(failure)?;
    let mut table = Table::new(record.table_id, record.config.clone());
    table.set_hands_played(record.hands_played);
    for seat in &record.seats {
        table
            .restore_player(seat.to_player())
            .map_err(|e| failure(format!("seat {}: {e}", seat.seat)))?;
    }
    Ok(table)
}

/// Loads every persisted table, cancels unfinished hands and registers the
/// rebuilt tables with `manager`. A table that fails is logged, reported
/// and skipped.
pub async fn recover_tables(
    repository: &dyn TableRepository,
    manager: &TableManager,
    config: &RecoveryConfig,
) -> Result<RecoveryReport, RecoveryError> {
    let mut report = RecoveryReport::default();

    for (table_id, loaded) in repository.load_tables().await? {
        let record = match loaded {
            Ok(record) => record,
            Err(e) => {
                log::error!("Recovery: skipping table {table_id}: {e}");
                report.failures.push(RecoveryError::PartialFailure {
                    table_id,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let table = match rebuild_table(&record) {
            Ok(table) => table,
            Err(e) => {
                log::error!("Recovery: {e}");
                report.failures.push(e);
                continue;
            }
        };

        if let Some(hand_id) = record.unfinished_hand {
            if let Err(e) = repository.cancel_hand(hand_id).await {
                log::error!("Recovery: table {table_id}: failed to cancel hand {hand_id}: {e}");
                report.failures.push(RecoveryError::PartialFailure {
                    table_id,
                    reason: format!("cancelling hand {hand_id}: {e}"),
                });
                continue;
            }
            log::warn!("Recovery: table {table_id}: cancelled unfinished hand {hand_id}");
            report.cancelled_hands.push(hand_id);
        }

        let auto_start =
            record.unfinished_hand.is_none() && table.eligible_player_count() >= table.config().min_players;
        let players = table.num_players();
        manager.register_table(table).await;
        report.recovered.push(table_id);

        if auto_start {
            match manager.schedule_start(table_id, config.grace_period).await {
                Ok(()) => report.scheduled_starts.push(table_id),
                Err(e) => log::error!("Recovery: table {table_id}: could not schedule start: {e}"),
            }
        }
        log::info!("Recovery: table {table_id} restored with {players} players");
    }

    log::info!(
        "Recovery finished: {} tables restored, {} hands cancelled, {} failures",
        report.recovered.len(),
        report.cancelled_hands.len(),
        report.failures.len()
    );
    Ok(report)
}
