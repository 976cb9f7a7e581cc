//! Poker hand evaluation.
//!
//! Pure functions only. A hand's strength is its category followed by the
//! rank values that break ties within that category, so two strengths
//! compare with the derived `Ord`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::entities::Card;

/// Hand categories, weakest first.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "High Card",
            Self::OnePair => "One Pair",
            Self::TwoPair => "Two Pair",
            Self::ThreeOfAKind => "Three of a Kind",
            Self::Straight => "Straight",
            Self::Flush => "Flush",
            Self::FullHouse => "Full House",
            Self::FourOfAKind => "Four of a Kind",
            Self::StraightFlush => "Straight Flush",
        };
        write!(f, "{repr}")
    }
}

/// Category plus tie-break ranks in significance order. For straights the
/// only rank is the high card, which is 5 for the wheel.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HandStrength {
    pub category: HandCategory,
    pub ranks: Vec<u8>,
}

impl HandStrength {
    #[must_use]
    pub fn label(&self) -> String {
        if self.category == HandCategory::StraightFlush && self.ranks.first() == Some(&14) {
            "Royal Flush".to_string()
        } else {
            self.category.to_string()
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct EvaluatedHand {
    pub strength: HandStrength,
    pub cards: [Card; 5],
}

/// High card of a straight, or `None`. Expects values sorted high to low.
fn straight_high(values: &[u8; 5]) -> Option<u8> {
    let distinct = values.windows(2).all(|w| w[0] != w[1]);
    if !distinct {
        return None;
    }
    if values[0] - values[4] == 4 {
        Some(values[0])
    } else if *values == [14, 5, 4, 3, 2] {
        Some(5)
    } else {
        None
    }
}

#[must_use]
pub fn evaluate_five(cards: &[Card; 5]) -> HandStrength {
    let mut values = cards.map(Card::value);
    values.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = cards.iter().all(|c| c.suit == cards[0].suit);
    if let Some(high) = straight_high(&values) {
        let category = if is_flush {
            HandCategory::StraightFlush
        } else {
            HandCategory::Straight
        };
        return HandStrength {
            category,
            ranks: vec![high],
        };
    }

    // (count, value) sorted by count then value, both descending.
    let mut groups: Vec<(u8, u8)> = Vec::with_capacity(5);
    for value in values {
        match groups.iter_mut().find(|(_, v)| *v == value) {
            Some((count, _)) => *count += 1,
            None => groups.push((1, value)),
        }
    }
    groups.sort_unstable_by(|a, b| b.cmp(a));
    let ranks: Vec<u8> = groups.iter().map(|&(_, v)| v).collect();

    let category = match (groups[0].0, groups.get(1).map_or(0, |g| g.0)) {
        (4, _) => HandCategory::FourOfAKind,
        (3, 2) => HandCategory::FullHouse,
        _ if is_flush => HandCategory::Flush,
        (3, _) => HandCategory::ThreeOfAKind,
        (2, 2) => HandCategory::TwoPair,
        (2, _) => HandCategory::OnePair,
        _ => HandCategory::HighCard,
    };
    HandStrength { category, ranks }
}

/// Best five-card hand from hole cards plus board. `None` until at least
/// five cards are available.
#[must_use]
pub fn best_hand(hole: &[Card], board: &[Card]) -> Option<EvaluatedHand> {
    let cards: Vec<Card> = hole.iter().chain(board).copied().collect();
    let n = cards.len();
    if n < 5 {
        return None;
    }

    let mut best: Option<EvaluatedHand> = None;
    for a in 0..n {
        for b in a + 1..n {
            for c in b + 1..n {
                for d in c + 1..n {
                    for e in d + 1..n {
                        let hand = [cards[a], cards[b], cards[c], cards[d], cards[e]];
                        let strength = evaluate_five(&hand);
                        if best.as_ref().is_none_or(|b| strength > b.strength) {
                            best = Some(EvaluatedHand {
                                strength,
                                cards: hand,
                            });
                        }
                    }
                }
            }
        }
    }
    best
}
