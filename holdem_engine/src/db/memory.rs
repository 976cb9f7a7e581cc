//! In-memory `TableRepository` for tests and database-less runs.
//!
//! Same idempotency rules as the PostgreSQL repository. Failures can be
//! injected to exercise settlement retries and partial recovery.

use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU32, AtomicUsize, Ordering},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    errors::{PersistenceError, PersistenceResult},
    models::{HandStart, HandStatus, LedgerEntry, SettleOutcome, Settlement, TableRecord},
    repository::TableRepository,
};
use crate::game::entities::TableId;

#[derive(Debug, Clone)]
struct StoredHand {
    table_id: TableId,
    status: HandStatus,
    settlement: Option<Settlement>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<TableId, TableRecord>,
    hands: HashMap<Uuid, StoredHand>,
    hand_order: Vec<Uuid>,
    ledger: Vec<LedgerEntry>,
    ledger_keys: HashSet<String>,
    corrupt_tables: HashSet<TableId>,
}

#[derive(Debug, Default)]
pub struct InMemoryTableRepository {
    state: RwLock<State>,
    failing_settlements: AtomicU32,
    settle_calls: AtomicUsize,
}

impl InMemoryTableRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` settlement attempts fail.
    pub fn fail_next_settlements(&self, count: u32) {
        self.failing_settlements.store(count, Ordering::SeqCst);
    }

    /// Makes `load_table` fail for this table.
    pub async fn mark_corrupt(&self, table_id: TableId) {
        self.state.write().await.corrupt_tables.insert(table_id);
    }

    pub fn settle_calls(&self) -> usize {
        self.settle_calls.load(Ordering::SeqCst)
    }

    pub async fn hand_status(&self, hand_id: Uuid) -> Option<HandStatus> {
        self.state.read().await.hands.get(&hand_id).map(|h| h.status)
    }

    pub async fn ledger(&self) -> Vec<LedgerEntry> {
        self.state.read().await.ledger.clone()
    }

    pub async fn settlement(&self, hand_id: Uuid) -> Option<Settlement> {
        self.state
            .read()
            .await
            .hands
            .get(&hand_id)
            .and_then(|h| h.settlement.clone())
    }

    /// Stored snapshot without the unfinished-hand lookup.
    pub async fn stored_table(&self, table_id: TableId) -> Option<TableRecord> {
        self.state.read().await.tables.get(&table_id).cloned()
    }
}

#[async_trait]
impl TableRepository for InMemoryTableRepository {
    async fn table_ids(&self) -> PersistenceResult<Vec<TableId>> {
        let state = self.state.read().await;
        let mut ids: Vec<TableId> = state.tables.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn load_table(&self, table_id: TableId) -> PersistenceResult<TableRecord> {
        let state = self.state.read().await;
        if state.corrupt_tables.contains(&table_id) {
            return Err(PersistenceError::Corrupt(format!("table {table_id} is unreadable")));
        }
        let mut record = state
            .tables
            .get(&table_id)
            .cloned()
            .ok_or(PersistenceError::TableNotFound(table_id))?;
        record.unfinished_hand = state.hand_order.iter().rev().copied().find(|id| {
            state
                .hands
                .get(id)
                .is_some_and(|h| h.table_id == table_id && h.status == HandStatus::InProgress)
        });
        Ok(record)
    }

    async fn save_table(&self, record: &TableRecord) -> PersistenceResult<()> {
        let mut state = self.state.write().await;
        let hands_played = state
            .tables
            .get(&record.table_id)
            .map_or(0, |t| t.hands_played)
            .max(record.hands_played);
        state.tables.insert(
            record.table_id,
            TableRecord {
                hands_played,
                unfinished_hand: None,
                ..record.clone()
            },
        );
        Ok(())
    }

    async fn begin_hand(&self, start: &HandStart) -> PersistenceResult<()> {
        let mut state = self.state.write().await;
        if !state.hands.contains_key(&start.hand_id) {
            state.hands.insert(
                start.hand_id,
                StoredHand {
                    table_id: start.table_id,
                    status: HandStatus::InProgress,
                    settlement: None,
                },
            );
            state.hand_order.push(start.hand_id);
        }
        Ok(())
    }

    async fn settle_hand(&self, settlement: &Settlement) -> PersistenceResult<SettleOutcome> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_settlements
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PersistenceError::Unavailable("injected settlement failure".to_string()));
        }

        let mut state = self.state.write().await;
        match state.hands.get(&settlement.hand_id).map(|h| h.status) {
            Some(HandStatus::Completed) => return Ok(SettleOutcome::AlreadyApplied),
            Some(HandStatus::Cancelled) => {
                return Err(PersistenceError::HandCancelled(settlement.hand_id));
            }
            Some(HandStatus::InProgress) => {}
            None => state.hand_order.push(settlement.hand_id),
        }

        for entry in settlement.ledger_entries() {
            if state.ledger_keys.insert(entry.idempotency_key.clone()) {
                state.ledger.push(entry);
            }
        }
        if let Some(table) = state.tables.get_mut(&settlement.table_id) {
            for stack in &settlement.seats_after {
                if let Some(seat) = table.seats.iter_mut().find(|s| s.user_id == stack.user_id) {
                    seat.chips = stack.chips;
                }
            }
            table.hands_played = table.hands_played.max(settlement.hand_number);
        }
        state.hands.insert(
            settlement.hand_id,
            StoredHand {
                table_id: settlement.table_id,
                status: HandStatus::Completed,
                settlement: Some(settlement.clone()),
            },
        );
        Ok(SettleOutcome::Applied)
    }

    async fn cancel_hand(&self, hand_id: Uuid) -> PersistenceResult<()> {
        let mut state = self.state.write().await;
        if let Some(hand) = state.hands.get_mut(&hand_id)
            && hand.status == HandStatus::InProgress
        {
            hand.status = HandStatus::Cancelled;
        }
        Ok(())
    }
}
