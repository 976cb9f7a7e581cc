//! Main pot and side pot partitioning.
//!
//! The pot is never tracked incrementally. It's rebuilt from every seat's
//! total investment for the hand, so it can't drift from what the players
//! actually put in.

use serde::{Deserialize, Serialize};

use super::entities::{Chips, SeatIndex, UserId};

/// What one seat has put into the current hand.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Contribution {
    pub user_id: UserId,
    pub seat: SeatIndex,
    pub invested: Chips,
    pub folded: bool,
}

/// A pot tier. The main pot uses the same shape as the side pots.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SidePot {
    pub amount: Chips,
    /// Investment level that caps this tier.
    pub cap: Chips,
    /// Players who can win this tier, in seat order.
    pub eligible: Vec<UserId>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Pot {
    pub main: SidePot,
    pub side_pots: Vec<SidePot>,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Payout {
    pub user_id: UserId,
    pub amount: Chips,
}

impl Pot {
    /// Builds the main pot and side pots from per-seat contributions.
    ///
    /// Tier caps are the distinct investment levels of players still in
    /// the hand. Each tier collects, from every contributor folded or not,
    /// whatever they put in between the previous cap and this one. Only
    /// non-folded players who reached the cap can win it. Chips a folded
    /// player put in above the highest live cap go to the top tier.
    #[must_use]
    pub fn from_contributions(contributions: &[Contribution]) -> Self {
        let mut caps: Vec<Chips> = contributions
            .iter()
            .filter(|c| !c.folded && c.invested > 0)
            .map(|c| c.invested)
            .collect();
        caps.sort_unstable();
        caps.dedup();

        let mut seated: Vec<&Contribution> = contributions.iter().collect();
        seated.sort_by_key(|c| c.seat);

        let mut tiers = Vec::with_capacity(caps.len());
        let mut previous = 0;
        for &cap in &caps {
            let amount = seated
                .iter()
                .map(|c| c.invested.min(cap) - c.invested.min(previous))
                .sum();
            let eligible = seated
                .iter()
                .filter(|c| !c.folded && c.invested >= cap)
                .map(|c| c.user_id)
                .collect();
            tiers.push(SidePot {
                amount,
                cap,
                eligible,
            });
            previous = cap;
        }

        let overflow: Chips = seated
            .iter()
            .map(|c| c.invested.saturating_sub(previous))
            .sum();
        if overflow > 0 {
            match tiers.last_mut() {
                Some(top) => top.amount += overflow,
                // Only folded money in the middle. Nobody can win it yet.
                None => tiers.push(SidePot {
                    amount: overflow,
                    cap: previous,
                    eligible: Vec::new(),
                }),
            }
        }

        let mut tiers = tiers.into_iter();
        Self {
            main: tiers.next().unwrap_or_default(),
            side_pots: tiers.collect(),
        }
    }

    #[must_use]
    pub fn total(&self) -> Chips {
        self.main.amount + self.side_pots.iter().map(|p| p.amount).sum::<Chips>()
    }

    /// Main pot first, then side pots in ascending cap order.
    pub fn tiers(&self) -> impl Iterator<Item = &SidePot> {
        std::iter::once(&self.main).chain(self.side_pots.iter())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Splits every tier between its best eligible hands.
    ///
    /// Tiers are settled poorest first. `strengths` holds one entry per
    /// contender; `clockwise` lists contenders starting left of the button
    /// and decides who takes an odd chip from a split. A tier with no
    /// ranked eligible player goes to the first contender clockwise so no
    /// chips are lost.
    #[must_use]
    pub fn distribute<S: Ord>(&self, strengths: &[(UserId, S)], clockwise: &[UserId]) -> Vec<Payout> {
        let mut payouts: Vec<Payout> = Vec::new();
        let mut credit = |user_id: UserId, amount: Chips| {
            if amount == 0 {
                return;
            }
            match payouts.iter_mut().find(|p| p.user_id == user_id) {
                Some(payout) => payout.amount += amount,
                None => payouts.push(Payout { user_id, amount }),
            }
        };

        for tier in self.tiers() {
            if tier.amount == 0 {
                continue;
            }
            let best = strengths
                .iter()
                .filter(|(id, _)| tier.eligible.contains(id))
                .map(|(_, strength)| strength)
                .max();
            let winners: Vec<UserId> = match best {
                Some(best) => clockwise
                    .iter()
                    .copied()
                    .filter(|id| {
                        tier.eligible.contains(id)
                            && strengths.iter().any(|(sid, s)| sid == id && s == best)
                    })
                    .collect(),
                None => Vec::new(),
            };

            let Some(&first) = winners.first().or(clockwise.first()) else {
                continue;
            };
            if winners.is_empty() {
                credit(first, tier.amount);
                continue;
            }
            let share = tier.amount / winners.len() as Chips;
            let remainder = tier.amount % winners.len() as Chips;
            for &winner in &winners {
                credit(winner, share);
            }
            credit(first, remainder);
        }
        payouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contrib(user_id: UserId, invested: Chips, folded: bool) -> Contribution {
        Contribution {
            user_id,
            seat: user_id as SeatIndex,
            invested,
            folded,
        }
    }

    #[test]
    fn test_single_pot_when_all_equal() {
        let pot = Pot::from_contributions(&[
            contrib(0, 100, false),
            contrib(1, 100, false),
            contrib(2, 100, false),
        ]);
        assert_eq!(pot.main.amount, 300);
        assert_eq!(pot.main.eligible, vec![0, 1, 2]);
        assert!(pot.side_pots.is_empty());
    }

    #[test]
    fn test_short_all_in_creates_side_pot() {
        let pot = Pot::from_contributions(&[
            contrib(0, 50, false),
            contrib(1, 100, false),
            contrib(2, 100, false),
        ]);
        assert_eq!(pot.main.amount, 150);
        assert_eq!(pot.main.eligible, vec![0, 1, 2]);
        assert_eq!(pot.side_pots.len(), 1);
        assert_eq!(pot.side_pots[0].amount, 100);
        assert_eq!(pot.side_pots[0].eligible, vec![1, 2]);
        assert_eq!(pot.total(), 250);
    }

    #[test]
    fn test_folded_chips_count_but_not_eligible() {
        let pot = Pot::from_contributions(&[
            contrib(0, 30, true),
            contrib(1, 100, false),
            contrib(2, 100, false),
        ]);
        assert_eq!(pot.total(), 230);
        assert_eq!(pot.main.amount, 230);
        assert_eq!(pot.main.eligible, vec![1, 2]);
    }

    #[test]
    fn test_folded_excess_goes_to_top_tier() {
        // Seat 0 bet 200 then folded to a 60 all-in and a call.
        let pot = Pot::from_contributions(&[
            contrib(0, 200, true),
            contrib(1, 60, false),
            contrib(2, 60, false),
        ]);
        assert_eq!(pot.total(), 320);
        assert_eq!(pot.main.amount, 320);
        assert_eq!(pot.main.eligible, vec![1, 2]);
    }

    #[test]
    fn test_three_tiers() {
        let pot = Pot::from_contributions(&[
            contrib(0, 25, false),
            contrib(1, 75, false),
            contrib(2, 150, false),
            contrib(3, 150, false),
        ]);
        assert_eq!(pot.main.amount, 100);
        assert_eq!(pot.side_pots[0].amount, 150);
        assert_eq!(pot.side_pots[0].eligible, vec![1, 2, 3]);
        assert_eq!(pot.side_pots[1].amount, 150);
        assert_eq!(pot.side_pots[1].eligible, vec![2, 3]);
        assert_eq!(pot.total(), 400);
    }

    #[test]
    fn test_empty_contributions() {
        let pot = Pot::from_contributions(&[]);
        assert!(pot.is_empty());
        assert_eq!(pot.tiers().count(), 1);
    }

    #[test]
    fn test_distribute_short_stack_wins_main_only() {
        let pot = Pot::from_contributions(&[
            contrib(0, 50, false),
            contrib(1, 100, false),
            contrib(2, 100, false),
        ]);
        // Higher number is the stronger hand.
        let strengths = [(0, 9), (1, 5), (2, 3)];
        let payouts = pot.distribute(&strengths, &[1, 2, 0]);
        assert_eq!(
            payouts,
            vec![
                Payout {
                    user_id: 0,
                    amount: 150
                },
                Payout {
                    user_id: 1,
                    amount: 100
                },
            ]
        );
    }

    #[test]
    fn test_split_remainder_goes_clockwise_from_button() {
        let pot = Pot::from_contributions(&[
            contrib(0, 35, false),
            contrib(1, 35, false),
            contrib(2, 31, true),
        ]);
        assert_eq!(pot.total(), 101);
        let strengths = [(0, 1), (1, 1)];
        // Seat 1 sits first after the button.
        let payouts = pot.distribute(&strengths, &[1, 0]);
        let one = payouts.iter().find(|p| p.user_id == 1).unwrap();
        let zero = payouts.iter().find(|p| p.user_id == 0).unwrap();
        assert_eq!(one.amount, 51);
        assert_eq!(zero.amount, 50);
    }

    #[test]
    fn test_distribute_conserves_chips() {
        let pot = Pot::from_contributions(&[
            contrib(0, 10, false),
            contrib(1, 40, false),
            contrib(2, 40, true),
            contrib(3, 70, false),
        ]);
        let strengths = [(0, 2), (1, 2), (3, 1)];
        let paid: Chips = pot
            .distribute(&strengths, &[0, 1, 3])
            .iter()
            .map(|p| p.amount)
            .sum();
        assert_eq!(paid, pot.total());
    }
}
