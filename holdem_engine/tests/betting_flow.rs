//! Full hands driven through the public table API.

use holdem_engine::game::{
    Action, BettingRound, Card, Chips, Deck, GameError, PlayerStatus, Table, TableStatus, UserId,
};
use holdem_engine::table::TableConfig;
use proptest::prelude::*;
use std::collections::HashSet;

fn table(stacks: &[Chips], seed: u64) -> Table {
    let config = TableConfig {
        min_buy_in: 10,
        ..TableConfig::default()
    };
    let mut table = Table::with_deck(1, config, Deck::with_seed(seed));
    for (i, &chips) in stacks.iter().enumerate() {
        table
            .add_player(i as UserId + 1, &format!("player{}", i + 1), i, chips)
            .unwrap();
    }
    table
}

fn to_act(table: &Table) -> UserId {
    let seat = table.hand().and_then(|h| h.current_turn).unwrap();
    table.players().find(|p| p.seat == seat).unwrap().user_id
}

fn settle(table: &mut Table) {
    let hand_id = table.pending_settlement().unwrap().hand_id;
    table.confirm_settlement(hand_id).unwrap();
}

fn check_or_call(table: &mut Table) {
    let user = to_act(table);
    let action = if table.legal_actions(user).contains(&Action::Check) {
        Action::Check
    } else {
        Action::Call
    };
    table.apply_action(user, action).unwrap();
}

#[test]
fn test_four_handed_hand_reaches_showdown() {
    let mut table = table(&[500, 500, 500, 500], 3);
    let total = table.total_chips();
    table.start_game().unwrap();
    assert_eq!(table.status(), TableStatus::Playing);

    let mut streets = vec![BettingRound::Preflop];
    while table.turn_key().is_some() {
        check_or_call(&mut table);
        assert_eq!(table.total_chips(), total);
        if let Some(hand) = table.hand()
            && streets.last() != Some(&hand.round)
        {
            streets.push(hand.round);
        }
    }
    assert_eq!(
        streets,
        vec![
            BettingRound::Preflop,
            BettingRound::Flop,
            BettingRound::Turn,
            BettingRound::River,
            BettingRound::Showdown
        ]
    );

    let hand = table.hand().unwrap();
    assert_eq!(hand.community.len(), 5);
    assert_eq!(hand.pot.total(), 40);
    assert_eq!(table.status(), TableStatus::HandComplete);

    // Every contender's cards are shown at showdown.
    let view = table.get_state(None);
    assert!(view.players.iter().all(|p| p.cards.iter().all(Option::is_some)));

    let settlement = table.pending_settlement().unwrap().clone();
    assert!(!settlement.winners.is_empty());
    assert!(settlement.winners.iter().all(|w| w.best_hand.len() == 5));
    settle(&mut table);
    assert_eq!(table.total_chips(), total);
    assert_eq!(table.last_winners(), settlement.winners.as_slice());
}

#[test]
fn test_chips_stay_in_pot_until_confirmed() {
    let mut table = table(&[200, 200, 200], 9);
    table.start_hand().unwrap();
    table.apply_action(to_act(&table), Action::Fold).unwrap();
    table.apply_action(to_act(&table), Action::Fold).unwrap();

    let settlement = table.pending_settlement().unwrap().clone();
    let winner = settlement.winners[0].user_id;
    assert_eq!(settlement.winners[0].hand_label, "Uncontested");
    assert!(settlement.winners[0].best_hand.is_empty());

    let before = table.player(winner).unwrap().chips;
    assert!(matches!(table.start_hand(), Err(GameError::SettlementPending)));
    settle(&mut table);
    assert_eq!(table.player(winner).unwrap().chips, before + 15);

    // Confirming twice changes nothing.
    table.confirm_settlement(settlement.hand_id).unwrap();
    assert_eq!(table.player(winner).unwrap().chips, before + 15);
}

#[test]
fn test_views_mask_other_players_cards() {
    let mut table = table(&[300, 300, 300], 5);
    table.start_hand().unwrap();

    let view = table.get_state(Some(2));
    for player in &view.players {
        assert_eq!(player.cards.len(), 2);
        let visible = player.cards.iter().all(Option::is_some);
        assert_eq!(visible, player.user_id == 2, "seat {}", player.seat);
    }

    let spectator = table.get_state(None);
    assert!(spectator.players.iter().flat_map(|p| &p.cards).all(Option::is_none));
    assert!(spectator.legal_actions.is_empty());

    let acting = to_act(&table);
    assert!(!table.get_state(Some(acting)).legal_actions.is_empty());
}

#[test]
fn test_uncontested_cards_stay_hidden() {
    let mut table = table(&[300, 300], 5);
    table.start_hand().unwrap();
    table.apply_action(to_act(&table), Action::Fold).unwrap();
    let view = table.get_state(None);
    assert!(view.players.iter().flat_map(|p| &p.cards).all(Option::is_none));
}

#[test]
fn test_min_raise_follows_last_full_raise() {
    let mut table = table(&[1000, 1000, 1000], 21);
    table.start_hand().unwrap();

    // Blinds 5/10: raise to 40 makes the next minimum 70.
    table.apply_action(to_act(&table), Action::Raise(40)).unwrap();
    let user = to_act(&table);
    assert!(matches!(
        table.apply_action(user, Action::Raise(60)),
        Err(GameError::InvalidAmount { .. })
    ));
    assert!(table.legal_actions(user).contains(&Action::Raise(70)));
    table.apply_action(user, Action::Raise(70)).unwrap();
    assert_eq!(table.hand().unwrap().current_bet, 70);
}

#[test]
fn test_busted_player_sits_out_next_hand() {
    let mut table = table(&[10, 500], 4);
    table.start_hand().unwrap();
    while table.turn_key().is_some() {
        let user = to_act(&table);
        table.apply_action(user, Action::AllIn).unwrap();
    }
    settle(&mut table);

    let busted: Vec<UserId> = table.players().filter(|p| p.chips == 0).map(|p| p.user_id).collect();
    if busted.is_empty() {
        return;
    }
    assert!(matches!(table.start_hand(), Err(GameError::NotEnoughPlayers)));
    for user in busted {
        assert_eq!(table.player(user).unwrap().status, PlayerStatus::SittingOut);
    }
}

#[derive(Clone, Debug)]
enum Choice {
    Passive,
    Aggressive,
    Fold,
    Shove,
}

fn choice_strategy() -> impl Strategy<Value = Choice> {
    prop_oneof![
        5 => Just(Choice::Passive),
        2 => Just(Choice::Aggressive),
        2 => Just(Choice::Fold),
        1 => Just(Choice::Shove),
    ]
}

fn pick(legal: &[Action], choice: &Choice) -> Action {
    let find = |f: fn(&Action) -> bool| legal.iter().copied().find(f);
    match choice {
        Choice::Passive => find(|a| matches!(a, Action::Check | Action::Call)),
        Choice::Aggressive => find(|a| matches!(a, Action::Raise(_))),
        Choice::Fold => find(|a| matches!(a, Action::Fold)),
        Choice::Shove => find(|a| matches!(a, Action::AllIn)),
    }
    .unwrap_or(Action::Fold)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_random_play_keeps_invariants(
        seed in any::<u64>(),
        stacks in prop::collection::vec(10u32..=1000, 2..=6),
        choices in prop::collection::vec(choice_strategy(), 200),
    ) {
        let mut table = table(&stacks, seed);
        let total = table.total_chips();
        let mut choices = choices.iter().cycle();

        for _ in 0..5 {
            if table.start_hand().is_err() {
                break;
            }
            let mut steps = 0;
            while table.turn_key().is_some() {
                let user = to_act(&table);
                let legal = table.legal_actions(user);
                prop_assert!(!legal.is_empty());
                let action = pick(&legal, choices.next().unwrap());

                let hand = table.hand().unwrap();
                let round = hand.round;
                let bet = hand.current_bet;
                let others_matched = table
                    .players()
                    .filter(|p| p.user_id != user && p.can_act())
                    .all(|p| p.has_acted && p.current_bet == bet);
                let actor = table.players().find(|p| p.user_id == user).unwrap();
                let raises = match action {
                    Action::Raise(_) => true,
                    Action::AllIn => actor.chips + actor.current_bet > bet,
                    _ => false,
                };

                prop_assert!(table.apply_action(user, action).is_ok(), "{action} rejected");
                prop_assert_eq!(table.total_chips(), total);

                let hand = table.hand().unwrap();
                let still_betting = table.players().filter(|p| p.can_act()).count() >= 2;
                if hand.round != round && still_betting {
                    prop_assert!(others_matched, "{round} closed with a decision owed");
                    prop_assert!(!raises, "{round} closed on a raise");
                }
                let mut seen: HashSet<Card> = hand.community.iter().copied().collect();
                prop_assert!(hand.community.len() <= 5);
                for player in table.players() {
                    for card in &player.hole_cards {
                        prop_assert!(seen.insert(*card), "{card} dealt twice");
                    }
                }

                steps += 1;
                prop_assert!(steps < 500);
            }

            let settlement = table.pending_settlement().unwrap().clone();
            let paid: Chips = settlement.payouts.iter().map(|p| p.amount).sum();
            let invested: Chips = settlement.contributions.iter().map(|(_, c)| c).sum();
            prop_assert_eq!(paid, invested);
            settle(&mut table);
            prop_assert_eq!(table.total_chips(), total);
        }
    }
}
