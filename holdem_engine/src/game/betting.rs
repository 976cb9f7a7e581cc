//! Betting rounds: legal actions, turn order and round closure.

use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{
    constants::{BOARD_CARDS, FLOP_CARDS, RIVER_CARDS, TURN_CARDS},
    entities::{Action, Chips, Deck, Player, PlayerStatus, SeatIndex, UserId},
    errors::GameError,
    table::{BettingRound, CurrentHand, Table},
};

/// Identifies one pending decision. A timeout armed for a key only fires
/// while that exact decision is still pending.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct TurnKey {
    pub hand_number: u64,
    pub seat: SeatIndex,
    pub action_seq: u64,
}

fn needs_to_act(player: &Player, hand: &CurrentHand) -> bool {
    player.can_act() && (!player.has_acted || player.current_bet < hand.current_bet)
}

/// Only a full raise reopens betting to players who already acted.
fn may_raise(player: &Player, hand: &CurrentHand) -> bool {
    !player.has_acted || player.current_bet < hand.last_full_raise_to
}

impl Table {
    #[must_use]
    pub fn turn_key(&self) -> Option<TurnKey> {
        let hand = self.hand.as_ref().filter(|h| h.is_betting())?;
        Some(TurnKey {
            hand_number: hand.hand_number,
            seat: hand.current_turn?,
            action_seq: hand.action_seq,
        })
    }

    /// Actions `user_id` could legally take right now. Empty when it isn't
    /// their turn.
    #[must_use]
    pub fn legal_actions(&self, user_id: UserId) -> Vec<Action> {
        let (Some(hand), Ok(seat)) = (self.hand.as_ref(), self.seat_of(user_id)) else {
            return Vec::new();
        };
        let Some(player) = self.seats[seat].as_ref() else {
            return Vec::new();
        };
        if hand.current_turn != Some(seat) {
            return Vec::new();
        }
        let mut actions = vec![Action::Fold];
        if player.current_bet == hand.current_bet {
            actions.push(Action::Check);
        } else {
            actions.push(Action::Call);
        }
        let stack_to = player.chips + player.current_bet;
        let reopened = may_raise(player, hand);
        let min_raise_to = hand.current_bet + hand.min_raise;
        if reopened && stack_to > min_raise_to {
            actions.push(Action::Raise(min_raise_to));
        }
        if reopened || stack_to <= hand.current_bet {
            actions.push(Action::AllIn);
        }
        actions
    }

    /// Validates and applies a player's action.
    ///
    /// Rejected actions leave the table untouched. A voluntary action ends
    /// the player's timeout streak.
    pub fn apply_action(&mut self, user_id: UserId, action: Action) -> Result<(), GameError> {
        let seat = self.seat_of(user_id)?;
        self.apply_at_seat(seat, action)?;
        if let Some(player) = self.seats[seat].as_mut() {
            player.consecutive_timeouts = 0;
        }
        self.advance(seat)
    }

    /// Plays the default action for a decision whose clock ran out: check
    /// when that's free, fold otherwise. Returns `Ok(None)` when `key` no
    /// longer names the pending decision.
    pub fn apply_timeout(&mut self, key: TurnKey) -> Result<Option<Action>, GameError> {
        if self.turn_key() != Some(key) {
            return Ok(None);
        }
        let can_check = self.hand.as_ref().is_some_and(|hand| {
            self.seats[key.seat]
                .as_ref()
                .is_some_and(|p| p.current_bet == hand.current_bet)
        });
        let action = if can_check { Action::Check } else { Action::Fold };
        self.apply_at_seat(key.seat, action)?;
        if let Some(player) = self.seats[key.seat].as_mut() {
            player.consecutive_timeouts += 1;
            log::debug!(
                "Table {}: {} timed out ({} in a row), {action}",
                self.id,
                player.user_id,
                player.consecutive_timeouts
            );
        }
        self.advance(key.seat)?;
        Ok(Some(action))
    }

    /// Folds a leaving player. Only moves the hand along when it was
    /// their turn or the fold leaves a single contender.
    pub(super) fn fold_leaving(&mut self, seat: SeatIndex) -> Result<(), GameError> {
        let their_turn = self.hand.as_ref().is_some_and(|h| h.current_turn == Some(seat));
        if their_turn {
            self.apply_at_seat(seat, Action::Fold)?;
            return self.advance(seat);
        }
        let Some(player) = self.seats[seat].as_mut() else {
            return Ok(());
        };
        if player.status == PlayerStatus::Active {
            player.status = PlayerStatus::Folded;
            player.last_action = Some(Action::Fold);
            self.refresh_pot();
            if self.players().filter(|p| p.is_contesting()).count() <= 1 {
                return self.finish_uncontested();
            }
        }
        Ok(())
    }

    fn apply_at_seat(&mut self, seat: SeatIndex, action: Action) -> Result<(), GameError> {
        let Some(hand) = self.hand.as_mut().filter(|h| h.is_betting()) else {
            return Err(GameError::NoHandInProgress);
        };
        if hand.current_turn != Some(seat) {
            return Err(GameError::OutOfTurn);
        }
        let Some(player) = self.seats[seat].as_mut() else {
            return Err(GameError::UserNotSeated);
        };

        let to_call = hand.current_bet.saturating_sub(player.current_bet);
        let moved = match action {
            Action::Fold => {
                player.status = PlayerStatus::Folded;
                0
            }
            Action::Check => {
                if to_call > 0 {
                    return Err(GameError::InvalidAction);
                }
                0
            }
            Action::Call => {
                if to_call == 0 {
                    return Err(GameError::InvalidAction);
                }
                player.place_bet(to_call)
            }
            Action::Raise(_) if !may_raise(player, hand) => {
                return Err(GameError::InvalidAction);
            }
            Action::Raise(to) => {
                let min_to = hand.current_bet + hand.min_raise;
                if to <= hand.current_bet {
                    return Err(GameError::InvalidAmount {
                        amount: to,
                        minimum: min_to,
                    });
                }
                let needed = to - player.current_bet;
                if needed > player.chips {
                    return Err(GameError::InsufficientChips {
                        required: needed,
                        available: player.chips,
                    });
                }
                // Short of a full raise is only allowed as an all-in.
                if to < min_to && needed < player.chips {
                    return Err(GameError::InvalidAmount {
                        amount: to,
                        minimum: min_to,
                    });
                }
                raise_to(hand, to);
                player.place_bet(needed)
            }
            Action::AllIn => {
                let to = player.current_bet + player.chips;
                if to > hand.current_bet && !may_raise(player, hand) {
                    return Err(GameError::InvalidAction);
                }
                if to > hand.current_bet {
                    raise_to(hand, to);
                }
                player.place_bet(player.chips)
            }
        };

        player.has_acted = true;
        player.last_action = Some(action);
        player.last_amount = moved;
        hand.action_seq += 1;
        log::debug!(
            "Table {}: {} {action} (${moved}) on the {}",
            self.id,
            player.user_id,
            hand.round
        );
        self.refresh_pot();
        Ok(())
    }

    /// Hands the turn to the next seat that owes a decision after `from`.
    /// Closes the round when nobody does, and ends the hand when a single
    /// contender is left.
    pub(super) fn advance(&mut self, from: SeatIndex) -> Result<(), GameError> {
        loop {
            if self.players().filter(|p| p.is_contesting()).count() <= 1 {
                return self.finish_uncontested();
            }
            let Some(hand) = self.hand.as_ref() else {
                return Ok(());
            };
            let start = if hand.current_turn.is_none() && hand.round != BettingRound::Preflop {
                hand.dealer_seat
            } else {
                from
            };

            if !self.round_closed() {
                let next = self.next_seat_where(start, |p| needs_to_act(p, hand));
                if let Some(seat) = next {
                    let deadline = i64::try_from(self.config.action_timeout_secs())
                        .ok()
                        .and_then(TimeDelta::try_seconds)
                        .and_then(|timeout| Utc::now().checked_add_signed(timeout));
                    if let Some(hand) = self.hand.as_mut() {
                        hand.current_turn = Some(seat);
                        hand.action_deadline = deadline;
                    }
                    return Ok(());
                }
            }

            if self.close_round()? {
                return Ok(());
            }
        }
    }

    /// True when nobody owes a decision, or the only player still able to
    /// bet has already matched everyone else.
    fn round_closed(&self) -> bool {
        let Some(hand) = self.hand.as_ref() else {
            return true;
        };
        let actors: Vec<&Player> = self.players().filter(|p| p.can_act()).collect();
        match actors.as_slice() {
            [] => true,
            [only] => {
                let highest_other = self
                    .players()
                    .filter(|p| p.seat != only.seat && p.is_contesting())
                    .map(|p| p.current_bet)
                    .max()
                    .unwrap_or(0);
                only.current_bet >= highest_other.min(hand.current_bet)
            }
            _ => !actors.iter().any(|p| needs_to_act(p, hand)),
        }
    }

    /// Moves to the next street, or runs out the board and goes to
    /// showdown once at most one player can still bet. Returns `true` when
    /// the hand reached showdown.
    fn close_round(&mut self) -> Result<bool, GameError> {
        let big_blind = self.config.big_blind;
        let can_bet = self.players().filter(|p| p.can_act()).count() > 1;
        for player in self.seats.iter_mut().flatten() {
            player.has_acted = false;
            player.current_bet = 0;
        }
        let Some(hand) = self.hand.as_mut() else {
            return Ok(true);
        };
        hand.current_bet = 0;
        hand.min_raise = big_blind;
        hand.last_full_raise_to = 0;
        hand.current_turn = None;
        hand.action_deadline = None;
        hand.action_seq += 1;

        if can_bet && hand.round != BettingRound::River {
            deal_street(hand, &mut self.deck)?;
            log::debug!("Table {}: dealt the {}", self.id, hand.round);
            return Ok(false);
        }
        while hand.community.len() < BOARD_CARDS {
            deal_street(hand, &mut self.deck)?;
        }
        self.showdown()?;
        Ok(true)
    }
}

/// Raises the round's bet to `to`. Only a full raise moves the minimum
/// raise.
fn raise_to(hand: &mut CurrentHand, to: Chips) {
    let increment = to - hand.current_bet;
    if increment >= hand.min_raise {
        hand.min_raise = increment;
        hand.last_full_raise_to = to;
    }
    hand.current_bet = to;
}

fn deal_street(hand: &mut CurrentHand, deck: &mut Deck) -> Result<(), GameError> {
    let (count, next) = match hand.round {
        BettingRound::Preflop => (FLOP_CARDS, BettingRound::Flop),
        BettingRound::Flop => (TURN_CARDS, BettingRound::Turn),
        BettingRound::Turn => (RIVER_CARDS, BettingRound::River),
        BettingRound::River | BettingRound::Showdown => return Ok(()),
    };
    let cards = deck.deal_multiple(count)?;
    hand.community.extend(cards);
    hand.round = next;
    Ok(())
}
