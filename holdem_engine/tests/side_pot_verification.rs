//! Side pot tests: the partition rules and chip conservation
//!
//! These tests verify that side pots behave in all scenarios:
//! - Multiple all-ins at different amounts
//! - Folded players contribute but can't win
//! - Odd chips from a split go clockwise from the button
//! - Nobody wins more than the tiers they're eligible for

use holdem_engine::game::{
    Action, Chips, Deck, Table, UserId,
    pot::{Contribution, Pot},
};
use holdem_engine::table::TableConfig;
use proptest::prelude::*;

fn contrib(user_id: UserId, invested: Chips, folded: bool) -> Contribution {
    Contribution {
        user_id,
        seat: user_id as usize,
        invested,
        folded,
    }
}

fn seat_user(table: &Table) -> UserId {
    let seat = table.hand().and_then(|h| h.current_turn).unwrap();
    table.players().find(|p| p.seat == seat).unwrap().user_id
}

#[test]
fn test_three_stacks_all_in_preflop() {
    // Stacks of 50, 100 and 100 all move in before the flop.
    let config = TableConfig {
        min_buy_in: 50,
        ..TableConfig::default()
    };
    let mut table = Table::with_deck(1, config, Deck::with_seed(11));
    table.add_player(1, "short", 0, 50).unwrap();
    table.add_player(2, "mid", 1, 100).unwrap();
    table.add_player(3, "big", 2, 100).unwrap();
    let total = table.total_chips();
    table.start_hand().unwrap();

    while table.turn_key().is_some() {
        let user = seat_user(&table);
        table.apply_action(user, Action::AllIn).unwrap();
        assert_eq!(table.total_chips(), total);
    }

    let settlement = table.pending_settlement().unwrap().clone();
    let mut contributions = settlement.contributions.clone();
    contributions.sort_unstable();
    assert_eq!(contributions, vec![(1, 50), (2, 100), (3, 100)]);

    let pot = &table.hand().unwrap().pot;
    assert_eq!(pot.main.amount, 150);
    assert_eq!(pot.main.eligible.len(), 3);
    assert_eq!(pot.side_pots.len(), 1);
    assert_eq!(pot.side_pots[0].amount, 100);
    assert_eq!(pot.side_pots[0].eligible, vec![2, 3]);

    // The short stack can win at most the main pot.
    let short_payout: Chips = settlement
        .payouts
        .iter()
        .filter(|p| p.user_id == 1)
        .map(|p| p.amount)
        .sum();
    assert!(short_payout <= 150);

    let paid: Chips = settlement.payouts.iter().map(|p| p.amount).sum();
    assert_eq!(paid, 250);

    table.confirm_settlement(settlement.hand_id).unwrap();
    assert_eq!(table.total_chips(), total);
}

#[test]
fn test_folded_blind_feeds_pot_without_eligibility() {
    let pot = Pot::from_contributions(&[contrib(0, 5, true), contrib(1, 10, false), contrib(2, 10, false)]);
    assert_eq!(pot.total(), 25);
    assert_eq!(pot.main.eligible, vec![1, 2]);
    assert!(pot.side_pots.is_empty());
}

#[test]
fn test_split_side_pot_odd_chip() {
    // Two live players tie for a 51 chip tier.
    let pot = Pot::from_contributions(&[contrib(0, 20, false), contrib(1, 20, false), contrib(2, 11, true)]);
    let payouts = pot.distribute(&[(0, 7), (1, 7)], &[1, 0]);
    let by_user = |id| payouts.iter().find(|p| p.user_id == id).map_or(0, |p| p.amount);
    assert_eq!(by_user(1), 26);
    assert_eq!(by_user(0), 25);
}

fn contributions_strategy() -> impl Strategy<Value = Vec<Contribution>> {
    prop::collection::vec((0u32..=500, any::<bool>()), 2..=10).prop_map(|seats| {
        seats
            .into_iter()
            .enumerate()
            .map(|(i, (invested, folded))| contrib(i as UserId, invested, folded))
            .collect()
    })
}

fn has_live_money(contributions: &[Contribution]) -> bool {
    contributions.iter().any(|c| !c.folded && c.invested > 0)
}

proptest! {
    #[test]
    fn test_pot_total_equals_contributions(contributions in contributions_strategy()) {
        let pot = Pot::from_contributions(&contributions);
        let invested: Chips = contributions.iter().map(|c| c.invested).sum();
        prop_assert_eq!(pot.total(), invested);
    }

    #[test]
    fn test_eligibility_requires_matching_cap(contributions in contributions_strategy()) {
        prop_assume!(has_live_money(&contributions));
        let pot = Pot::from_contributions(&contributions);
        for tier in pot.tiers() {
            for contribution in &contributions {
                let eligible = tier.eligible.contains(&contribution.user_id);
                let qualifies = !contribution.folded && contribution.invested >= tier.cap;
                prop_assert_eq!(eligible, qualifies);
            }
        }
    }

    #[test]
    fn test_caps_strictly_increase(contributions in contributions_strategy()) {
        let pot = Pot::from_contributions(&contributions);
        let caps: Vec<Chips> = pot.tiers().map(|t| t.cap).collect();
        prop_assert!(caps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_distribution_conserves_chips(
        contributions in contributions_strategy(),
        strengths in prop::collection::vec(0u8..5, 10),
    ) {
        prop_assume!(has_live_money(&contributions));
        let pot = Pot::from_contributions(&contributions);
        let live: Vec<UserId> = contributions.iter().filter(|c| !c.folded).map(|c| c.user_id).collect();
        let ranked: Vec<(UserId, u8)> = live.iter().map(|&id| (id, strengths[id as usize])).collect();

        let payouts = pot.distribute(&ranked, &live);
        let paid: Chips = payouts.iter().map(|p| p.amount).sum();
        prop_assert_eq!(paid, pot.total());
    }

    #[test]
    fn test_nobody_wins_beyond_their_tiers(
        contributions in contributions_strategy(),
        strengths in prop::collection::vec(0u8..5, 10),
    ) {
        prop_assume!(has_live_money(&contributions));
        let pot = Pot::from_contributions(&contributions);
        let live: Vec<UserId> = contributions.iter().filter(|c| !c.folded).map(|c| c.user_id).collect();
        let ranked: Vec<(UserId, u8)> = live.iter().map(|&id| (id, strengths[id as usize])).collect();

        for payout in pot.distribute(&ranked, &live) {
            let reachable: Chips = pot
                .tiers()
                .filter(|t| t.eligible.contains(&payout.user_id))
                .map(|t| t.amount)
                .sum();
            prop_assert!(payout.amount <= reachable);
        }
    }
}
