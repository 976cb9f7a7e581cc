//! Hand Evaluation Example
//!
//! Evaluates a few hands and compares them the way showdown does.

use holdem_engine::game::{
    Card,
    eval::{best_hand, evaluate_five},
};

fn cards(text: &str) -> Vec<Card> {
    text.split_whitespace()
        .filter_map(|c| c.parse().ok())
        .collect()
}

fn main() {
    println!("=== Hand Evaluation Example ===\n");

    println!("Example 1: best five of seven");
    let hole = cards("Ah Kh");
    let board = cards("Qh Jh Th 9s 2c");
    if let Some(hand) = best_hand(&hole, &board) {
        let shown: Vec<String> = hand.cards.iter().map(ToString::to_string).collect();
        println!("Hole {hole:?} on {board:?}");
        println!("Best hand: {} ({})\n", shown.join(" "), hand.strength.label());
    }

    println!("Example 2: comparing two hands");
    let board = cards("Kd 9c 7s 4h 2d");
    let aces = best_hand(&cards("As Ac"), &board);
    let kings = best_hand(&cards("Ks Kc"), &board);
    if let (Some(aces), Some(kings)) = (aces, kings) {
        println!("Aces: {}, Kings: {}", aces.strength.label(), kings.strength.label());
        if kings.strength > aces.strength {
            println!("Set of kings beats a pair of aces\n");
        }
    }

    println!("Example 3: the wheel is the lowest straight");
    let wheel: Option<[Card; 5]> = cards("Ad 2c 3h 4s 5d").try_into().ok();
    let six_high: Option<[Card; 5]> = cards("2c 3h 4s 5d 6c").try_into().ok();
    if let (Some(wheel), Some(six_high)) = (wheel, six_high) {
        let wheel = evaluate_five(&wheel);
        let six_high = evaluate_five(&six_high);
        println!("Wheel ranks {:?}, six high ranks {:?}", wheel.ranks, six_high.ranks);
        println!("Six high wins: {}", six_high > wheel);
    }
}
