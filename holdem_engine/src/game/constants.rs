//! Table-wide limits and board sizes.

/// Hard ceiling on seats per table. Ten seats deal at most 20 hole cards
/// plus a 5 card board, which always fits in a 52 card deck.
pub const MAX_PLAYERS: usize = 10;

/// Minimum number of funded, seated players needed to deal a hand.
pub const MIN_PLAYERS_TO_START: usize = 2;

pub const HOLE_CARDS: usize = 2;
pub const FLOP_CARDS: usize = 3;
pub const TURN_CARDS: usize = 1;
pub const RIVER_CARDS: usize = 1;
pub const BOARD_CARDS: usize = FLOP_CARDS + TURN_CARDS + RIVER_CARDS;

pub const DECK_SIZE: usize = 52;

/// Longest display name kept for a seated player.
pub const MAX_NAME_LENGTH: usize = 32;
