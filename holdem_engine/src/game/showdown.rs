//! End of hand: showdown, the settlement hand-off and aborts.
//!
//! A finished hand doesn't pay anyone by itself. It produces a
//! [`HandSettlement`] that has to be persisted and then confirmed with
//! [`Table::confirm_settlement`]; until then the chips stay in the pot.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    entities::{Card, Chips, PlayerStatus, SeatIndex, UserId},
    errors::GameError,
    eval::{self, HandStrength},
    pot::Payout,
    table::{BettingRound, Table, TableStatus},
};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Winner {
    pub user_id: UserId,
    pub seat: SeatIndex,
    pub amount: Chips,
    /// Hand name, or "Uncontested" when everyone else folded.
    pub hand_label: String,
    /// Best five cards. Empty for uncontested wins, which aren't shown.
    pub best_hand: Vec<Card>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SeatStack {
    pub user_id: UserId,
    pub seat: SeatIndex,
    pub chips: Chips,
}

/// Outcome of a hand that's waiting to be persisted.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandSettlement {
    pub hand_id: Uuid,
    pub hand_number: u64,
    pub payouts: Vec<Payout>,
    pub winners: Vec<Winner>,
    /// What every dealt-in player put in, folded players included.
    pub contributions: Vec<(UserId, Chips)>,
    /// Every seat's stack once the payouts are credited.
    pub stacks_after: Vec<SeatStack>,
}

impl Table {
    #[must_use]
    pub fn pending_settlement(&self) -> Option<&HandSettlement> {
        self.pending_settlement.as_ref()
    }

    /// Evaluates every contender's best hand and splits the pot tiers.
    pub(super) fn showdown(&mut self) -> Result<(), GameError> {
        let community = self
            .hand
            .as_ref()
            .map(|h| h.community.clone())
            .ok_or(GameError::NoHandInProgress)?;

        let mut strengths: Vec<(UserId, HandStrength)> = Vec::new();
        let mut best_cards: Vec<(UserId, Vec<Card>)> = Vec::new();
        let mut revealed = Vec::new();
        for player in self.players().filter(|p| p.is_contesting()) {
            let best = eval::best_hand(&player.hole_cards, &community).ok_or(
                GameError::InsufficientCards {
                    requested: 5,
                    remaining: player.hole_cards.len() + community.len(),
                },
            )?;
            strengths.push((player.user_id, best.strength));
            best_cards.push((player.user_id, best.cards.to_vec()));
            revealed.push(player.seat);
        }

        let labels = |user_id: UserId| {
            let label = strengths
                .iter()
                .find(|(id, _)| *id == user_id)
                .map_or_else(String::new, |(_, s)| s.label());
            let cards = best_cards
                .iter()
                .find(|(id, _)| *id == user_id)
                .map(|(_, c)| c.clone())
                .unwrap_or_default();
            (label, cards)
        };
        let payouts = self.distribute_pot(&strengths)?;
        let winners = self.winners_from(&payouts, labels);
        self.settle(payouts, winners, revealed)
    }

    /// Everyone else folded. The last player takes the whole pot and their
    /// cards stay hidden.
    pub(super) fn finish_uncontested(&mut self) -> Result<(), GameError> {
        let strengths: Vec<(UserId, ())> = self
            .players()
            .filter(|p| p.is_contesting())
            .map(|p| (p.user_id, ()))
            .collect();
        let payouts = self.distribute_pot(&strengths)?;
        let winners = self.winners_from(&payouts, |_| ("Uncontested".to_string(), Vec::new()));
        self.settle(payouts, winners, Vec::new())
    }

    fn distribute_pot<S: Ord>(&self, strengths: &[(UserId, S)]) -> Result<Vec<Payout>, GameError> {
        let hand = self.hand.as_ref().ok_or(GameError::NoHandInProgress)?;
        let clockwise: Vec<UserId> = self
            .clockwise_from(hand.dealer_seat)
            .filter_map(|seat| self.seats[seat].as_ref())
            .filter(|p| p.is_contesting())
            .map(|p| p.user_id)
            .collect();
        Ok(hand.pot.distribute(strengths, &clockwise))
    }

    fn winners_from(
        &self,
        payouts: &[Payout],
        describe: impl Fn(UserId) -> (String, Vec<Card>),
    ) -> Vec<Winner> {
        payouts
            .iter()
            .filter_map(|payout| {
                let player = self.player(payout.user_id)?;
                let (hand_label, best_hand) = describe(payout.user_id);
                Some(Winner {
                    user_id: payout.user_id,
                    seat: player.seat,
                    amount: payout.amount,
                    hand_label,
                    best_hand,
                })
            })
            .collect()
    }

    fn settle(
        &mut self,
        payouts: Vec<Payout>,
        winners: Vec<Winner>,
        revealed: Vec<SeatIndex>,
    ) -> Result<(), GameError> {
        let contributions = self
            .players()
            .filter(|p| p.total_invested > 0)
            .map(|p| (p.user_id, p.total_invested))
            .collect();
        let stacks_after = self
            .players()
            .map(|p| {
                let won: Chips = payouts
                    .iter()
                    .filter(|w| w.user_id == p.user_id)
                    .map(|w| w.amount)
                    .sum();
                SeatStack {
                    user_id: p.user_id,
                    seat: p.seat,
                    chips: p.chips + won,
                }
            })
            .collect();

        let hand = self.hand.as_mut().ok_or(GameError::NoHandInProgress)?;
        hand.round = BettingRound::Showdown;
        hand.current_turn = None;
        hand.action_deadline = None;
        hand.action_seq += 1;
        hand.revealed = revealed;

        for winner in &winners {
            log::info!(
                "Table {}: hand #{} {} wins ${} with {}",
                self.id,
                hand.hand_number,
                winner.user_id,
                winner.amount,
                winner.hand_label
            );
        }
        self.pending_settlement = Some(HandSettlement {
            hand_id: hand.hand_id,
            hand_number: hand.hand_number,
            payouts,
            winners,
            contributions,
            stacks_after,
        });
        self.status = TableStatus::HandComplete;
        Ok(())
    }

    /// Credits a persisted settlement and closes out the hand. Confirming
    /// a hand that's already been confirmed is a no-op.
    pub fn confirm_settlement(&mut self, hand_id: Uuid) -> Result<(), GameError> {
        let Some(settlement) = self.pending_settlement.take_if(|s| s.hand_id == hand_id) else {
            return if self.pending_settlement.is_some() {
                Err(GameError::SettlementPending)
            } else {
                Ok(())
            };
        };

        for payout in &settlement.payouts {
            if let Some(player) = self
                .seats
                .iter_mut()
                .flatten()
                .find(|p| p.user_id == payout.user_id)
            {
                player.chips += payout.amount;
            }
        }
        for player in self.seats.iter_mut().flatten() {
            player.current_bet = 0;
            player.total_invested = 0;
        }
        self.last_winners = settlement.winners;
        self.hand = None;
        self.remove_leaving_players();
        log::debug!("Table {}: hand #{} settled", self.id, settlement.hand_number);
        Ok(())
    }

    /// Abandons the hand in play and gives every player back what they put
    /// in. Returns the aborted hand's id.
    pub fn abort_hand(&mut self) -> Option<Uuid> {
        let hand = self.hand.take()?;
        for player in self.seats.iter_mut().flatten() {
            player.chips += player.total_invested;
            player.current_bet = 0;
            player.total_invested = 0;
            player.hole_cards.clear();
            if matches!(player.status, PlayerStatus::AllIn | PlayerStatus::Folded) {
                player.status = PlayerStatus::Active;
            }
        }
        self.pending_settlement = None;
        self.status = TableStatus::Waiting;
        self.remove_leaving_players();
        log::warn!("Table {}: hand #{} aborted, bets refunded", self.id, hand.hand_number);
        Some(hand.hand_id)
    }
}
