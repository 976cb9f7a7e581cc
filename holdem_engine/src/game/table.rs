//! The table: seats, the dealer button and the hand currently in play.
//!
//! Betting lives in [`super::betting`] and settlement in
//! [`super::showdown`]; both are further `impl Table` blocks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{
    constants::HOLE_CARDS,
    entities::{Card, Chips, Deck, Player, PlayerStatus, SeatIndex, TableId, UserId},
    errors::GameError,
    pot::{Contribution, Pot},
    showdown::{HandSettlement, Winner},
};
use crate::table::config::TableConfig;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum TableStatus {
    Waiting,
    Playing,
    HandComplete,
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::HandComplete => "hand complete",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum BettingRound {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl fmt::Display for BettingRound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
        };
        write!(f, "{repr}")
    }
}

/// Everything about the hand in play. Dropped once its settlement is
/// confirmed or it's aborted.
#[derive(Clone, Debug)]
pub struct CurrentHand {
    pub hand_id: Uuid,
    pub hand_number: u64,
    pub dealer_seat: SeatIndex,
    pub small_blind_seat: SeatIndex,
    pub big_blind_seat: SeatIndex,
    pub current_turn: Option<SeatIndex>,
    pub round: BettingRound,
    pub community: Vec<Card>,
    pub pot: Pot,
    /// Highest bet this round; what everyone still in has to match.
    pub current_bet: Chips,
    /// Smallest legal raise increment.
    pub min_raise: Chips,
    /// Bet level set by the last full raise. A player who already acted
    /// may only raise again once this climbs above their bet.
    pub last_full_raise_to: Chips,
    pub action_deadline: Option<DateTime<Utc>>,
    /// Bumped on every applied action so a decision can be told apart from
    /// an earlier one by the same seat.
    pub action_seq: u64,
    /// Seats whose hole cards are face up.
    pub revealed: Vec<SeatIndex>,
}

impl CurrentHand {
    #[must_use]
    pub fn is_betting(&self) -> bool {
        self.round != BettingRound::Showdown
    }
}

#[derive(Debug)]
pub struct Table {
    pub(super) id: TableId,
    pub(super) config: TableConfig,
    pub(super) status: TableStatus,
    pub(super) seats: Vec<Option<Player>>,
    pub(super) hand: Option<CurrentHand>,
    pub(super) last_winners: Vec<Winner>,
    pub(super) deck: Deck,
    pub(super) dealer_seat: Option<SeatIndex>,
    pub(super) hands_played: u64,
    pub(super) pending_settlement: Option<HandSettlement>,
}

impl Table {
    #[must_use]
    pub fn new(id: TableId, config: TableConfig) -> Self {
        Self::with_deck(id, config, Deck::new())
    }

    /// Table dealing from the given deck, usually a seeded one.
    #[must_use]
    pub fn with_deck(id: TableId, config: TableConfig, deck: Deck) -> Self {
        let seats = vec![None; config.max_players];
        Self {
            id,
            config,
            status: TableStatus::Waiting,
            seats,
            hand: None,
            last_winners: Vec::new(),
            deck,
            dealer_seat: None,
            hands_played: 0,
            pending_settlement: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> TableId {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    #[must_use]
    pub fn status(&self) -> TableStatus {
        self.status
    }

    #[must_use]
    pub fn hand(&self) -> Option<&CurrentHand> {
        self.hand.as_ref()
    }

    #[must_use]
    pub fn hands_played(&self) -> u64 {
        self.hands_played
    }

    /// Continues hand numbering after a restart.
    pub fn set_hands_played(&mut self, hands_played: u64) {
        self.hands_played = hands_played;
    }

    #[must_use]
    pub fn last_winners(&self) -> &[Winner] {
        &self.last_winners
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.seats.iter().flatten()
    }

    #[must_use]
    pub fn player(&self, user_id: UserId) -> Option<&Player> {
        self.players().find(|p| p.user_id == user_id)
    }

    #[must_use]
    pub fn num_players(&self) -> usize {
        self.players().count()
    }

    #[must_use]
    pub fn is_hand_live(&self) -> bool {
        self.status == TableStatus::Playing
    }

    /// Players who'd be dealt into a hand started now.
    #[must_use]
    pub fn eligible_player_count(&self) -> usize {
        self.players()
            .filter(|p| {
                p.is_eligible_for_hand()
                    && !p.sit_out_next_hand
                    && p.consecutive_timeouts < self.config.max_consecutive_timeouts
            })
            .count()
    }

    /// Stacks plus everything in the pot. Constant for the life of a hand.
    #[must_use]
    pub fn total_chips(&self) -> Chips {
        let stacks: Chips = self.players().map(|p| p.chips).sum();
        stacks + self.hand.as_ref().map_or(0, |h| h.pot.total())
    }

    pub(super) fn seat_of(&self, user_id: UserId) -> Result<SeatIndex, GameError> {
        self.seats
            .iter()
            .position(|s| s.as_ref().is_some_and(|p| p.user_id == user_id))
            .ok_or(GameError::UserNotSeated)
    }

    /// Seats after `from`, clockwise, ending with `from` itself.
    pub(super) fn clockwise_from(&self, from: SeatIndex) -> impl Iterator<Item = SeatIndex> + use<> {
        let n = self.seats.len();
        (1..=n).map(move |offset| (from + offset) % n)
    }

    pub(super) fn next_seat_where(
        &self,
        from: SeatIndex,
        pred: impl Fn(&Player) -> bool,
    ) -> Option<SeatIndex> {
        self.clockwise_from(from)
            .find(|&seat| self.seats[seat].as_ref().is_some_and(&pred))
    }

    /// Seats `user_id` at `seat` with a buy-in of `chips`.
    pub fn add_player(
        &mut self,
        user_id: UserId,
        name: &str,
        seat: SeatIndex,
        chips: Chips,
    ) -> Result<(), GameError> {
        if seat >= self.seats.len() {
            return Err(GameError::InvalidSeat(seat));
        }
        if self.player(user_id).is_some() {
            return Err(GameError::UserAlreadySeated);
        }
        if self.seats.iter().all(Option::is_some) {
            return Err(GameError::TableFull);
        }
        if self.seats[seat].is_some() {
            return Err(GameError::SeatTaken(seat));
        }
        if chips < self.config.min_buy_in || chips > self.config.max_buy_in {
            return Err(GameError::BuyInOutOfRange {
                amount: chips,
                min: self.config.min_buy_in,
                max: self.config.max_buy_in,
            });
        }
        self.seats[seat] = Some(Player::new(user_id, name, seat, chips));
        log::debug!("Table {}: {user_id} sat down in seat {seat} with ${chips}", self.id);
        Ok(())
    }

    /// Puts back a player restored from persistence. Stacks aren't checked
    /// against the buy-in range since they've been played since.
    pub fn restore_player(&mut self, player: Player) -> Result<(), GameError> {
        let seat = player.seat;
        if seat >= self.seats.len() {
            return Err(GameError::InvalidSeat(seat));
        }
        if self.player(player.user_id).is_some() {
            return Err(GameError::UserAlreadySeated);
        }
        if self.seats[seat].is_some() {
            return Err(GameError::SeatTaken(seat));
        }
        self.seats[seat] = Some(player);
        Ok(())
    }

    /// Stands a player up. Returns their stack when they leave right away,
    /// or `None` when they're still in the hand and will be removed once it
    /// ends. A player still able to act is folded first.
    pub fn remove_player(&mut self, user_id: UserId) -> Result<Option<Chips>, GameError> {
        let seat = self.seat_of(user_id)?;
        let in_hand = self.is_hand_live()
            && self.seats[seat]
                .as_ref()
                .is_some_and(|p| !p.hole_cards.is_empty() && p.status != PlayerStatus::Folded);
        let invested = self.seats[seat].as_ref().map_or(0, |p| p.total_invested);

        if !in_hand && invested == 0 && self.pending_settlement.is_none() {
            let chips = self.seats[seat].take().map_or(0, |p| p.chips);
            log::debug!("Table {}: {user_id} left seat {seat}", self.id);
            return Ok(Some(chips));
        }

        if let Some(player) = self.seats[seat].as_mut() {
            player.leaving = true;
        }
        if in_hand {
            self.fold_leaving(seat)?;
        }
        Ok(None)
    }

    /// Sitting out takes effect at the next hand. Sitting back in clears
    /// the timeout streak.
    pub fn set_sitting_out(&mut self, user_id: UserId, sitting_out: bool) -> Result<(), GameError> {
        let seat = self.seat_of(user_id)?;
        let in_hand = self.is_hand_live();
        let Some(player) = self.seats[seat].as_mut() else {
            return Err(GameError::UserNotSeated);
        };

        if sitting_out {
            if in_hand && !player.hole_cards.is_empty() {
                player.sit_out_next_hand = true;
            } else {
                player.status = PlayerStatus::SittingOut;
            }
            return Ok(());
        }

        if player.chips == 0 {
            return Err(GameError::InsufficientChips {
                required: 1,
                available: 0,
            });
        }
        player.sit_out_next_hand = false;
        player.consecutive_timeouts = 0;
        if player.status == PlayerStatus::SittingOut {
            player.status = PlayerStatus::Active;
        }
        Ok(())
    }

    /// Alias of [`Table::start_hand`].
    pub fn start_game(&mut self) -> Result<(), GameError> {
        self.start_hand()
    }

    /// Rotates the button, posts blinds, deals hole cards and hands the
    /// first decision of the preflop round to the seat after the big blind.
    pub fn start_hand(&mut self) -> Result<(), GameError> {
        if self.pending_settlement.is_some() {
            return Err(GameError::SettlementPending);
        }
        if self.is_hand_live() {
            return Err(GameError::HandInProgress);
        }

        let max_timeouts = self.config.max_consecutive_timeouts;
        for player in self.seats.iter_mut().flatten() {
            if player.sit_out_next_hand || player.consecutive_timeouts >= max_timeouts {
                if player.status != PlayerStatus::SittingOut {
                    log::info!("Table {}: sitting out {}", self.id, player.user_id);
                }
                player.status = PlayerStatus::SittingOut;
                player.sit_out_next_hand = false;
            }
            player.reset();
        }

        let dealt_in: Vec<SeatIndex> = self
            .seats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.as_ref().is_some_and(Player::is_eligible_for_hand))
            .map(|(seat, _)| seat)
            .collect();
        if dealt_in.len() < self.config.min_players {
            return Err(GameError::NotEnoughPlayers);
        }

        let eligible = |p: &Player| p.is_eligible_for_hand();
        let dealer = match self.dealer_seat {
            Some(previous) => self.next_seat_where(previous, eligible),
            None => dealt_in.first().copied(),
        }
        .ok_or(GameError::NotEnoughPlayers)?;
        let (small_blind_seat, big_blind_seat) = if dealt_in.len() == 2 {
            let big = self
                .next_seat_where(dealer, eligible)
                .ok_or(GameError::NotEnoughPlayers)?;
            (dealer, big)
        } else {
            let small = self
                .next_seat_where(dealer, eligible)
                .ok_or(GameError::NotEnoughPlayers)?;
            let big = self
                .next_seat_where(small, eligible)
                .ok_or(GameError::NotEnoughPlayers)?;
            (small, big)
        };

        self.deck.reset();
        for &seat in &dealt_in {
            let cards = match self.deck.deal_multiple(HOLE_CARDS) {
                Ok(cards) => cards,
                Err(error) => {
                    for player in self.seats.iter_mut().flatten() {
                        player.hole_cards.clear();
                    }
                    log::error!("Table {}: dealing failed: {error}", self.id);
                    return Err(error);
                }
            };
            if let Some(player) = self.seats[seat].as_mut() {
                player.hole_cards = cards;
            }
        }

        let blinds = self.config.blinds();
        if let Some(player) = self.seats[dealer].as_mut() {
            player.is_dealer = true;
        }
        let mut posted_small = 0;
        if let Some(player) = self.seats[small_blind_seat].as_mut() {
            player.is_small_blind = true;
            posted_small = player.place_bet(blinds.small);
            player.last_amount = posted_small;
        }
        let mut posted_big = 0;
        if let Some(player) = self.seats[big_blind_seat].as_mut() {
            player.is_big_blind = true;
            posted_big = player.place_bet(blinds.big);
            player.last_amount = posted_big;
        }
        // Heads-up against a short all-in big blind the button only owes
        // what was actually posted.
        let opening_bet = if dealt_in.len() == 2 {
            posted_small.max(posted_big)
        } else {
            blinds.big
        };

        self.dealer_seat = Some(dealer);
        self.hands_played += 1;
        self.last_winners.clear();
        self.status = TableStatus::Playing;
        self.hand = Some(CurrentHand {
            hand_id: Uuid::new_v4(),
            hand_number: self.hands_played,
            dealer_seat: dealer,
            small_blind_seat,
            big_blind_seat,
            current_turn: None,
            round: BettingRound::Preflop,
            community: Vec::with_capacity(5),
            pot: Pot::default(),
            current_bet: opening_bet,
            min_raise: blinds.big,
            last_full_raise_to: opening_bet,
            action_deadline: None,
            action_seq: 0,
            revealed: Vec::new(),
        });
        self.refresh_pot();
        log::info!(
            "Table {}: hand #{} started, {} players, button on seat {dealer}",
            self.id,
            self.hands_played,
            dealt_in.len()
        );

        self.advance(big_blind_seat)
    }

    /// Rebuilds the pot from what every seat has invested this hand.
    pub(super) fn refresh_pot(&mut self) {
        let contributions: Vec<Contribution> = self
            .players()
            .filter(|p| p.total_invested > 0 || !p.hole_cards.is_empty())
            .map(|p| Contribution {
                user_id: p.user_id,
                seat: p.seat,
                invested: p.total_invested,
                folded: p.status == PlayerStatus::Folded || p.hole_cards.is_empty(),
            })
            .collect();
        if let Some(hand) = self.hand.as_mut() {
            hand.pot = Pot::from_contributions(&contributions);
        }
    }

    /// Drops players who asked to leave during the hand that just ended.
    pub(super) fn remove_leaving_players(&mut self) -> Vec<(UserId, Chips)> {
        let mut removed = Vec::new();
        for seat in &mut self.seats {
            if seat.as_ref().is_some_and(|p| p.leaving) {
                if let Some(player) = seat.take() {
                    log::debug!("Table {}: {} left after the hand", self.id, player.user_id);
                    removed.push((player.user_id, player.chips));
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::with_deck(1, TableConfig::default(), Deck::with_seed(42))
    }

    #[test]
    fn test_add_player_errors() {
        let mut table = table();
        assert_eq!(table.add_player(1, "alice", 0, 500), Ok(()));
        assert_eq!(table.add_player(1, "alice", 1, 500), Err(GameError::UserAlreadySeated));
        assert_eq!(table.add_player(2, "bob", 0, 500), Err(GameError::SeatTaken(0)));
        assert_eq!(table.add_player(2, "bob", 10, 500), Err(GameError::InvalidSeat(10)));
        assert_eq!(
            table.add_player(2, "bob", 1, 50),
            Err(GameError::BuyInOutOfRange {
                amount: 50,
                min: 200,
                max: 1000
            })
        );
    }

    #[test]
    fn test_table_full() {
        let config = TableConfig {
            max_players: 2,
            ..TableConfig::default()
        };
        let mut table = Table::with_deck(1, config, Deck::with_seed(1));
        table.add_player(1, "a", 0, 500).unwrap();
        table.add_player(2, "b", 1, 500).unwrap();
        assert_eq!(table.add_player(3, "c", 1, 500), Err(GameError::TableFull));
    }

    #[test]
    fn test_start_requires_two_players() {
        let mut table = table();
        assert_eq!(table.start_hand(), Err(GameError::NotEnoughPlayers));
        table.add_player(1, "alice", 0, 500).unwrap();
        assert_eq!(table.start_hand(), Err(GameError::NotEnoughPlayers));
        assert_eq!(table.status(), TableStatus::Waiting);
    }

    #[test]
    fn test_start_hand_posts_blinds_and_deals() {
        let mut table = table();
        table.add_player(1, "alice", 0, 500).unwrap();
        table.add_player(2, "bob", 3, 500).unwrap();
        table.add_player(3, "carol", 6, 500).unwrap();
        table.start_hand().unwrap();

        let hand = table.hand().unwrap();
        assert_eq!(hand.dealer_seat, 0);
        assert_eq!(hand.small_blind_seat, 3);
        assert_eq!(hand.big_blind_seat, 6);
        assert_eq!(hand.current_turn, Some(0));
        assert_eq!(hand.pot.total(), 15);
        assert_eq!(table.total_chips(), 1500);
        assert_eq!(table.deck.cards_remaining(), 52 - 6);
        assert!(table.players().all(|p| p.hole_cards.len() == 2));
        assert_eq!(table.player(2).unwrap().current_bet, 5);
        assert_eq!(table.player(3).unwrap().current_bet, 10);
        assert!(!table.player(3).unwrap().has_acted);
    }

    #[test]
    fn test_heads_up_dealer_posts_small_blind_and_acts_first() {
        let mut table = table();
        table.add_player(1, "alice", 2, 500).unwrap();
        table.add_player(2, "bob", 7, 500).unwrap();
        table.start_hand().unwrap();

        let hand = table.hand().unwrap();
        assert_eq!(hand.dealer_seat, 2);
        assert_eq!(hand.small_blind_seat, 2);
        assert_eq!(hand.big_blind_seat, 7);
        assert_eq!(hand.current_turn, Some(2));
    }

    #[test]
    fn test_sitting_out_player_is_skipped() {
        let mut table = table();
        table.add_player(1, "alice", 0, 500).unwrap();
        table.add_player(2, "bob", 1, 500).unwrap();
        table.add_player(3, "carol", 2, 500).unwrap();
        table.set_sitting_out(3, true).unwrap();
        table.start_hand().unwrap();
        assert!(table.player(3).unwrap().hole_cards.is_empty());
        assert_eq!(table.deck.cards_remaining(), 48);
    }

    #[test]
    fn test_remove_player_between_hands() {
        let mut table = table();
        table.add_player(1, "alice", 0, 500).unwrap();
        assert_eq!(table.remove_player(1), Ok(Some(500)));
        assert_eq!(table.num_players(), 0);
        assert_eq!(table.remove_player(1), Err(GameError::UserNotSeated));
    }

    #[test]
    fn test_sit_in_requires_chips() {
        let mut table = table();
        table.add_player(1, "alice", 0, 500).unwrap();
        table.seats[0].as_mut().unwrap().chips = 0;
        assert!(matches!(
            table.set_sitting_out(1, false),
            Err(GameError::InsufficientChips { .. })
        ));
    }
}
