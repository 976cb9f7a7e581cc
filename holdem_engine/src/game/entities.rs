use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

use super::{
    constants::{DECK_SIZE, MAX_NAME_LENGTH},
    errors::GameError,
};

/// Type alias for whole chips. All bets and player stacks are counted in
/// whole chips; there are no fractional chips anywhere in the engine.
pub type Chips = u32;

/// Account identifier handed to us by the session layer.
pub type UserId = i64;

/// Table identifier shared with persistence.
pub type TableId = i64;

/// Type alias for seat positions around the table.
pub type SeatIndex = usize;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const ALL: [Self; 4] = [Self::Club, Self::Diamond, Self::Heart, Self::Spade];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Diamond => "♦",
            Self::Heart => "♥",
            Self::Spade => "♠",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Self; 13] = [
        Self::Two,
        Self::Three,
        Self::Four,
        Self::Five,
        Self::Six,
        Self::Seven,
        Self::Eight,
        Self::Nine,
        Self::Ten,
        Self::Jack,
        Self::Queen,
        Self::King,
        Self::Ace,
    ];

    /// Comparison value, deuce = 2 through ace = 14.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8 + 2
    }
}

impl TryFrom<u8> for Rank {
    type Error = ParseCardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2..=14 => Ok(Self::ALL[usize::from(value - 2)]),
            _ => Err(ParseCardError::Rank(value.to_string())),
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Ten => "T",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
            other => return write!(f, "{}", other.value()),
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParseCardError {
    #[error("invalid rank {0:?}")]
    Rank(String),
    #[error("invalid suit {0:?}")]
    Suit(String),
    #[error("expected two characters, got {0:?}")]
    Length(String),
}

/// An immutable playing card.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    #[must_use]
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.rank.value()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// Parses the usual two character shorthand, e.g. `"As"`, `"Td"`, `"7c"`.
impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(rank), Some(suit), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(ParseCardError::Length(s.to_string()));
        };
        let rank = match rank.to_ascii_uppercase() {
            'A' => Rank::Ace,
            'K' => Rank::King,
            'Q' => Rank::Queen,
            'J' => Rank::Jack,
            'T' => Rank::Ten,
            d @ '2'..='9' => Rank::try_from(d as u8 - b'0')?,
            other => return Err(ParseCardError::Rank(other.to_string())),
        };
        let suit = match suit.to_ascii_lowercase() {
            'c' => Suit::Club,
            'd' => Suit::Diamond,
            'h' => Suit::Heart,
            's' => Suit::Spade,
            other => return Err(ParseCardError::Suit(other.to_string())),
        };
        Ok(Self::new(rank, suit))
    }
}

/// A 52 card deck with its own injectable random source.
///
/// Cards are dealt off the end of `cards`; anything dealt is gone until
/// the next [`Deck::reset`], so dealt + remaining is always 52.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
    rng: StdRng,
}

impl Deck {
    /// Deck shuffled from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic deck for tests and hand replays.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        let mut deck = Self {
            cards: Vec::with_capacity(DECK_SIZE),
            rng,
        };
        deck.reset();
        deck
    }

    /// Rebuilds all 52 cards and Fisher-Yates shuffles them.
    pub fn reset(&mut self) {
        self.cards.clear();
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                self.cards.push(Card::new(rank, suit));
            }
        }
        for i in (1..self.cards.len()).rev() {
            let j = self.rng.random_range(0..=i);
            self.cards.swap(i, j);
        }
    }

    pub fn deal(&mut self) -> Result<Card, GameError> {
        self.cards.pop().ok_or(GameError::DeckExhausted)
    }

    /// Deals `n` cards or nothing at all.
    pub fn deal_multiple(&mut self, n: usize) -> Result<Vec<Card>, GameError> {
        let remaining = self.cards.len();
        if remaining < n {
            return Err(GameError::InsufficientCards {
                requested: n,
                remaining,
            });
        }
        let mut dealt = self.cards.split_off(remaining - n);
        // Top of the deck first.
        dealt.reverse();
        Ok(dealt)
    }

    #[must_use]
    pub fn cards_remaining(&self) -> usize {
        self.cards.len()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}/{}", self.small, self.big)
    }
}

/// A betting decision submitted by a player (or injected on timeout).
///
/// `Raise` carries the total the player's bet for this round is raised
/// *to*, not the increment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Action {
    Fold,
    Check,
    Call,
    Raise(Chips),
    AllIn,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Fold => write!(f, "folds"),
            Self::Check => write!(f, "checks"),
            Self::Call => write!(f, "calls"),
            Self::Raise(amount) => write!(f, "raises to ${amount}"),
            Self::AllIn => write!(f, "goes all-in"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum PlayerStatus {
    Active,
    Folded,
    AllIn,
    SittingOut,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Active => "active",
            Self::Folded => "folded",
            Self::AllIn => "all-in",
            Self::SittingOut => "sitting out",
        };
        write!(f, "{repr}")
    }
}

/// Per-seat game state. Owned by the table for as long as the player is
/// seated and reset, not rebuilt, between hands.
#[derive(Clone, Debug)]
pub struct Player {
    pub user_id: UserId,
    pub name: String,
    pub seat: SeatIndex,
    pub chips: Chips,
    pub status: PlayerStatus,
    /// Chips put in during the current betting round only.
    pub current_bet: Chips,
    pub hole_cards: Vec<Card>,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
    pub last_action: Option<Action>,
    pub last_amount: Chips,
    /// Chips put in across every round of the current hand.
    pub total_invested: Chips,
    pub has_acted: bool,
    pub consecutive_timeouts: u32,
    /// Set when the player asks to leave mid-hand; they're removed at the
    /// next hand boundary.
    pub leaving: bool,
    /// Sit out from the next hand on.
    pub sit_out_next_hand: bool,
}

impl Player {
    #[must_use]
    pub fn new(user_id: UserId, name: &str, seat: SeatIndex, chips: Chips) -> Self {
        let name: String = name
            .trim()
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .take(MAX_NAME_LENGTH)
            .collect();
        Self {
            user_id,
            name,
            seat,
            chips,
            status: if chips == 0 {
                PlayerStatus::SittingOut
            } else {
                PlayerStatus::Active
            },
            current_bet: 0,
            hole_cards: Vec::with_capacity(2),
            is_dealer: false,
            is_small_blind: false,
            is_big_blind: false,
            last_action: None,
            last_amount: 0,
            total_invested: 0,
            has_acted: false,
            consecutive_timeouts: 0,
            leaving: false,
            sit_out_next_hand: false,
        }
    }

    /// Moves up to `amount` chips from the stack into the pot and returns
    /// how many actually moved. Betting the whole stack (or more) puts the
    /// player all-in.
    pub fn place_bet(&mut self, amount: Chips) -> Chips {
        let moved = amount.min(self.chips);
        self.chips -= moved;
        self.current_bet += moved;
        self.total_invested += moved;
        if self.chips == 0 && self.status != PlayerStatus::Folded {
            self.status = PlayerStatus::AllIn;
        }
        moved
    }

    /// Clears everything tied to the last hand. Busted players are sat
    /// out until they're funded again.
    pub fn reset(&mut self) {
        self.current_bet = 0;
        self.hole_cards.clear();
        self.is_dealer = false;
        self.is_small_blind = false;
        self.is_big_blind = false;
        self.last_action = None;
        self.last_amount = 0;
        self.total_invested = 0;
        self.has_acted = false;
        if self.chips == 0 {
            self.status = PlayerStatus::SittingOut;
        } else if self.status != PlayerStatus::SittingOut {
            self.status = PlayerStatus::Active;
        }
    }

    /// Funded and not sitting out, so they'll be dealt in.
    #[must_use]
    pub fn is_eligible_for_hand(&self) -> bool {
        self.status != PlayerStatus::SittingOut && self.chips > 0 && !self.leaving
    }

    /// Dealt in, not folded and not all-in, so still has decisions to make.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.status == PlayerStatus::Active && self.chips > 0 && !self.hole_cards.is_empty()
    }

    /// Holds cards and hasn't folded.
    #[must_use]
    pub fn is_contesting(&self) -> bool {
        matches!(self.status, PlayerStatus::Active | PlayerStatus::AllIn)
            && !self.hole_cards.is_empty()
    }
}
