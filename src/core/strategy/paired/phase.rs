//! Cycle-phase computation.
//!
//! The cycle clock derives from the market's period timestamp. Phase
//! boundaries come from configuration; price extremes can pull the
//! transitions forward (a market pinned near certainty has nothing left
//! to build).

use crate::core::domain::Pips;

/// Position-construction phase within one market cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accumulate both legs while prices are undecided.
    Build,
    /// Eliminate downside; equalize the pair.
    Lock,
    /// Overweight the stronger leg once the pair is locked.
    Amplify,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Lock => "lock",
            Self::Amplify => "amplify",
        }
    }
}

/// Phase windows and early-transition prices.
#[derive(Debug, Clone, Copy)]
pub struct PhaseClock {
    pub build_end_secs: i64,
    pub amplify_start_secs: i64,
    pub early_lock_price: Pips,
    pub early_amplify_price: Pips,
}

impl PhaseClock {
    /// Phase at `elapsed` seconds into the cycle.
    ///
    /// `hot_price` is the highest bid across both sides; `locked` is the
    /// position's current lock state. Early transitions: a hot price at
    /// or above `early_lock_price` ends Build immediately, and a locked
    /// position at or above `early_amplify_price` amplifies early.
    #[must_use]
    pub fn phase_at(&self, elapsed: i64, hot_price: Pips, locked: bool) -> Phase {
        let time_phase = if elapsed < self.build_end_secs {
            Phase::Build
        } else if elapsed < self.amplify_start_secs {
            Phase::Lock
        } else {
            Phase::Amplify
        };

        match time_phase {
            Phase::Build if hot_price >= self.early_lock_price => {
                if locked && hot_price >= self.early_amplify_price {
                    Phase::Amplify
                } else {
                    Phase::Lock
                }
            }
            Phase::Lock if locked && hot_price >= self.early_amplify_price => Phase::Amplify,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> PhaseClock {
        PhaseClock {
            build_end_secs: 300,
            amplify_start_secs: 600,
            early_lock_price: Pips::new(8_500).unwrap(),
            early_amplify_price: Pips::new(9_300).unwrap(),
        }
    }

    fn pips(p: u32) -> Pips {
        Pips::new(p).unwrap()
    }

    #[test]
    fn phases_follow_the_clock() {
        let clock = clock();
        assert_eq!(clock.phase_at(0, pips(5_000), false), Phase::Build);
        assert_eq!(clock.phase_at(299, pips(5_000), false), Phase::Build);
        assert_eq!(clock.phase_at(300, pips(5_000), false), Phase::Lock);
        assert_eq!(clock.phase_at(599, pips(5_000), false), Phase::Lock);
        assert_eq!(clock.phase_at(600, pips(5_000), false), Phase::Amplify);
    }

    #[test]
    fn extreme_price_ends_build_early() {
        let clock = clock();
        assert_eq!(clock.phase_at(60, pips(8_500), false), Phase::Lock);
        assert_eq!(clock.phase_at(60, pips(8_499), false), Phase::Build);
    }

    #[test]
    fn locked_position_amplifies_early_at_extremes() {
        let clock = clock();
        assert_eq!(clock.phase_at(60, pips(9_300), true), Phase::Amplify);
        assert_eq!(clock.phase_at(400, pips(9_300), true), Phase::Amplify);
        // Unlocked positions never amplify early.
        assert_eq!(clock.phase_at(400, pips(9_300), false), Phase::Lock);
    }
}
