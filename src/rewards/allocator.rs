//! # Reward allocation: randomized amounts, pot sizes and timer spreads.
//!
//! Pure functions over a caller-supplied [`Rng`]; the manager passes a thread-local
//! generator, tests pass a seeded [`StdRng`](rand::rngs::StdRng).
//!
//! ## Early-bird pot
//! ```text
//! position = participants + 1
//!
//! position <  early_bird_pot_size → bonus = pot / 2, pot -= bonus
//! position == early_bird_pot_size → bonus = pot,     pot  = 0
//! position >  early_bird_pot_size → bonus = 0
//! ```
//! Positions are 1-based, so `participants == early_bird_pot_size - 1` is the claimant that
//! empties the pot: with a size of 2 and a pot of 10 the first two claimants get 5 and 5,
//! the third gets no bonus.
//!
//! The pot only shrinks, so a single award never exceeds `amount + pot_at_start`.

use std::time::Duration;

use rand::Rng;

use crate::config::ChannelConfig;

/// One grant: the random base plus the early-bird share taken from the pot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Award {
    /// Uniform amount in `[1, amount]`.
    pub base: u64,
    /// Early-bird bonus taken from the pot.
    pub bonus: u64,
}

impl Award {
    /// Total amount credited to the user.
    #[inline]
    pub fn total(&self) -> u64 {
        self.base.saturating_add(self.bonus)
    }
}

/// Uniform integer in `[max(base - variance, 1), base + variance]`.
pub fn spread<R: Rng + ?Sized>(rng: &mut R, base: u64, variance: u64) -> u64 {
    let low = base.saturating_sub(variance).max(1);
    let high = base.saturating_add(variance).max(low);
    rng.random_range(low..=high)
}

/// Pot at event start: a randomized per-user base times the eligible user count.
pub fn pot_size<R: Rng + ?Sized>(rng: &mut R, cfg: &ChannelConfig, eligible: u64) -> u64 {
    spread(rng, cfg.early_bird_pot, cfg.early_bird_pot_variance).saturating_mul(eligible)
}

/// Computes one claim's award and takes the early-bird bonus from `pot`.
///
/// `participants` is the number of users already credited in this event; the claim
/// being computed is number `participants + 1` (see the module docs for a worked pot).
pub fn amount<R: Rng + ?Sized>(
    rng: &mut R,
    cfg: &ChannelConfig,
    participants: u64,
    pot: &mut u64,
) -> Award {
    let base = rng.random_range(1..=cfg.amount.max(1));
    let position = participants.saturating_add(1);
    let size = cfg.early_bird_pot_size;

    let bonus = if position < size {
        *pot / 2
    } else if position == size {
        *pot
    } else {
        0
    };
    *pot -= bonus;
    Award { base, bonus }
}

/// Delay between queueing and arrival.
pub fn delay<R: Rng + ?Sized>(rng: &mut R, cfg: &ChannelConfig) -> Duration {
    Duration::from_millis(spread(rng, cfg.delay, cfg.delay_variance))
}

/// How long an arrived event stays redeemable.
pub fn duration<R: Rng + ?Sized>(rng: &mut R, cfg: &ChannelConfig) -> Duration {
    Duration::from_millis(spread(rng, cfg.duration, cfg.duration_variance))
}

/// Sorted read-only projection of `(user, score)` pairs: highest score first,
/// ties by ascending user id.
pub fn leaderboard<I>(scores: I) -> impl Iterator<Item = (u64, u64)>
where
    I: IntoIterator<Item = (u64, u64)>,
{
    let mut rows: Vec<(u64, u64)> = scores.into_iter().collect();
    rows.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    rows.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn early_bird(amount: u64, pot: u64, size: u64) -> ChannelConfig {
        ChannelConfig {
            amount,
            early_bird_pot: pot,
            early_bird_pot_size: size,
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn early_bird_scenario_drains_pot_in_two_claims() {
        let mut rng = StdRng::seed_from_u64(7);
        let cfg = early_bird(5, 10, 2);
        let mut pot = pot_size(&mut rng, &cfg, 1);
        assert_eq!(pot, 10);

        let first = amount(&mut rng, &cfg, 0, &mut pot);
        assert_eq!(first.bonus, 5);
        assert_eq!(pot, 5);

        let second = amount(&mut rng, &cfg, 1, &mut pot);
        assert_eq!(second.bonus, 5);
        assert_eq!(pot, 0);

        let third = amount(&mut rng, &cfg, 2, &mut pot);
        assert_eq!(third.bonus, 0);
        for award in [first, second, third] {
            assert!((1..=5).contains(&award.base));
        }
    }

    #[test]
    fn awards_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let cfg = ChannelConfig {
            amount: 8,
            early_bird_pot: 20,
            early_bird_pot_variance: 5,
            early_bird_pot_size: 4,
            ..ChannelConfig::default()
        };

        for _ in 0..200 {
            let start = pot_size(&mut rng, &cfg, 3);
            let mut pot = start;
            let mut prev = pot;
            for participants in 0..8 {
                let award = amount(&mut rng, &cfg, participants, &mut pot);
                assert!(award.total() >= 1);
                assert!(award.total() <= cfg.amount + start);
                assert!(pot <= prev);
                prev = pot;
            }
        }
    }

    #[test]
    fn zero_amount_and_zero_size_still_award_one() {
        let mut rng = StdRng::seed_from_u64(1);
        let cfg = early_bird(0, 10, 0);
        let mut pot = 10;
        let award = amount(&mut rng, &cfg, 0, &mut pot);
        assert_eq!(award, Award { base: 1, bonus: 0 });
        assert_eq!(pot, 10);
    }

    #[test]
    fn spread_is_floored_at_one() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let v = spread(&mut rng, 2, 10);
            assert!((1..=12).contains(&v));
        }
        assert_eq!(spread(&mut rng, 0, 0), 1);
        assert_eq!(spread(&mut rng, 500, 0), 500);
    }

    #[test]
    fn timers_follow_channel_config() {
        let mut rng = StdRng::seed_from_u64(9);
        let cfg = ChannelConfig {
            delay: 1_000,
            delay_variance: 250,
            duration: 0,
            ..ChannelConfig::default()
        };
        let d = delay(&mut rng, &cfg);
        assert!(d >= Duration::from_millis(750) && d <= Duration::from_millis(1_250));
        assert_eq!(duration(&mut rng, &cfg), Duration::from_millis(1));
    }

    #[test]
    fn leaderboard_orders_by_score_then_user() {
        let rows: Vec<_> = leaderboard(vec![(3, 10), (1, 4), (2, 10), (9, 0)]).collect();
        assert_eq!(rows, vec![(2, 10), (3, 10), (1, 4), (9, 0)]);
    }
}
