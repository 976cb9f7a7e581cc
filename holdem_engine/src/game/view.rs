//! Read-only snapshots of a table, as seen by one viewer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    entities::{Action, Card, Chips, PlayerStatus, SeatIndex, TableId, UserId},
    pot::Pot,
    showdown::Winner,
    table::{BettingRound, Table, TableStatus},
};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerView {
    pub user_id: UserId,
    pub name: String,
    pub seat: SeatIndex,
    pub chips: Chips,
    pub current_bet: Chips,
    pub total_invested: Chips,
    pub status: PlayerStatus,
    /// One entry per hole card; `None` is a card dealt face down.
    pub cards: Vec<Option<Card>>,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
    pub last_action: Option<Action>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableView {
    pub table_id: TableId,
    pub name: String,
    pub status: TableStatus,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub hand_number: Option<u64>,
    pub round: Option<BettingRound>,
    pub players: Vec<PlayerView>,
    pub community: Vec<Card>,
    pub pot: Pot,
    pub current_turn: Option<SeatIndex>,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub action_deadline: Option<DateTime<Utc>>,
    pub last_winners: Vec<Winner>,
    /// Actions the viewer may take now. Empty unless it's their turn.
    pub legal_actions: Vec<Action>,
}

impl Table {
    /// Snapshot for `viewer`. Only the viewer's own hole cards and cards
    /// turned over at showdown are visible.
    #[must_use]
    pub fn get_state(&self, viewer: Option<UserId>) -> TableView {
        let hand = self.hand.as_ref();
        let revealed: &[SeatIndex] = hand.map(|h| h.revealed.as_slice()).unwrap_or_default();

        let players = self
            .players()
            .map(|p| {
                let visible = viewer == Some(p.user_id) || revealed.contains(&p.seat);
                PlayerView {
                    user_id: p.user_id,
                    name: p.name.clone(),
                    seat: p.seat,
                    chips: p.chips,
                    current_bet: p.current_bet,
                    total_invested: p.total_invested,
                    status: p.status,
                    cards: p
                        .hole_cards
                        .iter()
                        .map(|&c| visible.then_some(c))
                        .collect(),
                    is_dealer: p.is_dealer,
                    is_small_blind: p.is_small_blind,
                    is_big_blind: p.is_big_blind,
                    last_action: p.last_action,
                }
            })
            .collect();

        TableView {
            table_id: self.id,
            name: self.config.name.clone(),
            status: self.status,
            small_blind: self.config.small_blind,
            big_blind: self.config.big_blind,
            hand_number: hand.map(|h| h.hand_number),
            round: hand.map(|h| h.round),
            players,
            community: hand.map(|h| h.community.clone()).unwrap_or_default(),
            pot: hand.map(|h| h.pot.clone()).unwrap_or_default(),
            current_turn: hand.and_then(|h| h.current_turn),
            current_bet: hand.map_or(0, |h| h.current_bet),
            min_raise: hand.map_or(0, |h| h.min_raise),
            action_deadline: hand.and_then(|h| h.action_deadline),
            last_winners: self.last_winners.clone(),
            legal_actions: viewer.map(|id| self.legal_actions(id)).unwrap_or_default(),
        }
    }
}
