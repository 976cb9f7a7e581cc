//! Records exchanged with the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::game::{
    entities::{Chips, Player, PlayerStatus, SeatIndex, TableId, UserId},
    pot::Payout,
    showdown::{HandSettlement, SeatStack, Winner},
    table::Table,
};
use crate::table::config::TableConfig;

/// One occupied seat as last persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRecord {
    pub user_id: UserId,
    pub name: String,
    pub seat: SeatIndex,
    pub chips: Chips,
    pub sitting_out: bool,
}

impl SeatRecord {
    #[must_use]
    pub fn from_player(player: &Player) -> Self {
        Self {
            user_id: player.user_id,
            name: player.name.clone(),
            seat: player.seat,
            chips: player.chips,
            sitting_out: player.status == PlayerStatus::SittingOut || player.sit_out_next_hand,
        }
    }

    /// Rebuilds the player between hands.
    #[must_use]
    pub fn to_player(&self) -> Player {
        let mut player = Player::new(self.user_id, &self.name, self.seat, self.chips);
        if self.sitting_out {
            player.status = PlayerStatus::SittingOut;
        }
        player
    }
}

/// Table snapshot used to rebuild a table at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub table_id: TableId,
    pub config: TableConfig,
    pub seats: Vec<SeatRecord>,
    pub hands_played: u64,
    /// A hand that was started but never completed or cancelled.
    pub unfinished_hand: Option<Uuid>,
}

impl TableRecord {
    /// Snapshot of a table's seats between hands. Seats are recorded with
    /// the chips they'd have if the hand in play were refunded.
    #[must_use]
    pub fn from_table(table: &Table) -> Self {
        let seats = table
            .players()
            .filter(|p| !p.leaving)
            .map(|p| SeatRecord {
                chips: p.chips + p.total_invested,
                ..SeatRecord::from_player(p)
            })
            .collect();
        Self {
            table_id: table.id(),
            config: table.config().clone(),
            seats,
            hands_played: table.hands_played(),
            unfinished_hand: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl HandStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HandStatus::InProgress => "in_progress",
            HandStatus::Completed => "completed",
            HandStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for HandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HandStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(HandStatus::InProgress),
            "completed" => Ok(HandStatus::Completed),
            "cancelled" => Ok(HandStatus::Cancelled),
            other => Err(format!("unknown hand status {other:?}")),
        }
    }
}

/// Written when a hand is dealt, so a crash mid-hand can be detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandStart {
    pub hand_id: Uuid,
    pub table_id: TableId,
    pub hand_number: u64,
    pub started_at: DateTime<Utc>,
    pub stacks: Vec<SeatStack>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Debit,
    Credit,
}

impl LedgerKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Debit => "debit",
            LedgerKind::Credit => "credit",
        }
    }
}

/// A chip movement caused by a hand. Keys are derived from the hand id so
/// replaying a settlement can't write the same entry twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub hand_id: Uuid,
    pub table_id: TableId,
    pub user_id: UserId,
    pub kind: LedgerKind,
    pub amount: Chips,
    pub idempotency_key: String,
}

impl LedgerEntry {
    /// Signed amount, debits negative.
    #[must_use]
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            LedgerKind::Debit => -i64::from(self.amount),
            LedgerKind::Credit => i64::from(self.amount),
        }
    }
}

/// Everything needed to pay out one hand, in a single idempotent write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub hand_id: Uuid,
    pub table_id: TableId,
    pub hand_number: u64,
    pub payouts: Vec<Payout>,
    pub winners: Vec<Winner>,
    pub contributions: Vec<(UserId, Chips)>,
    pub seats_after: Vec<SeatStack>,
}

impl Settlement {
    #[must_use]
    pub fn from_hand(table_id: TableId, hand: &HandSettlement) -> Self {
        Self {
            hand_id: hand.hand_id,
            table_id,
            hand_number: hand.hand_number,
            payouts: hand.payouts.clone(),
            winners: hand.winners.clone(),
            contributions: hand.contributions.clone(),
            seats_after: hand.stacks_after.clone(),
        }
    }

    #[must_use]
    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        let debits = self.contributions.iter().map(|&(user_id, amount)| LedgerEntry {
            hand_id: self.hand_id,
            table_id: self.table_id,
            user_id,
            kind: LedgerKind::Debit,
            amount,
            idempotency_key: format!("hand_{}_debit_{}", self.hand_id, user_id),
        });
        let credits = self.payouts.iter().map(|payout| LedgerEntry {
            hand_id: self.hand_id,
            table_id: self.table_id,
            user_id: payout.user_id,
            kind: LedgerKind::Credit,
            amount: payout.amount,
            idempotency_key: format!("hand_{}_credit_{}", self.hand_id, payout.user_id),
        });
        debits.chain(credits).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Applied,
    /// The hand had already been settled; nothing was written.
    AlreadyApplied,
}
