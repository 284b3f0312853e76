//! The level-up curve and its application to a member's XP state.

use super::exp::Exp;

/// Amount of XP required to go from `level` to `level + 1`.
///
/// This is the well-known Mee6 progression curve:
/// <https://github.com/Mee6/Mee6-documentation/blob/master/docs/levels_xp.md>
pub(crate) fn xp_to_next_level(level: i64) -> Exp {
    debug_assert!(level >= 0);
    #[allow(clippy::cast_sign_loss)]
    let level = level as u64;
    Exp(5 * level * level + 50 * level + 100)
}

/// XP state of a member within a guild, detached from any particular
/// database row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progression {
    pub(crate) level: i64,
    pub(crate) current_xp: Exp,
    pub(crate) xp_to_next_level: Exp,
    pub(crate) total_xp: Exp,
}

impl Progression {
    /// State of a member that has never earned XP.
    pub(crate) fn initial() -> Self {
        Self {
            level: 0,
            current_xp: Exp(0),
            xp_to_next_level: xp_to_next_level(0),
            total_xp: Exp(0),
        }
    }

    /// Applies an XP award, carrying overflow across level boundaries.
    ///
    /// The loop terminates because every threshold is positive and the
    /// remaining overflow strictly decreases each iteration. Afterwards
    /// `current_xp < xp_to_next_level` holds.
    pub(crate) fn award(self, amount: Exp) -> Self {
        let mut level = self.level;
        let mut threshold = self.xp_to_next_level;
        let mut xp = self.current_xp.0 + amount.0;
        while xp >= threshold.0 {
            level += 1;
            xp -= threshold.0;
            threshold = xp_to_next_level(level);
        }
        Self {
            level,
            current_xp: Exp(xp),
            xp_to_next_level: threshold,
            total_xp: self.total_xp + amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{xp_to_next_level, Exp, Progression};

    #[test]
    fn curve_thresholds() {
        assert_eq!(xp_to_next_level(0), Exp(100));
        assert_eq!(xp_to_next_level(1), Exp(155));
        assert_eq!(xp_to_next_level(2), Exp(220));
    }

    #[test]
    fn exactly_one_threshold_levels_up() {
        let state = Progression::initial().award(Exp(100));
        assert_eq!(state.level, 1);
        assert_eq!(state.current_xp, Exp(0));
        assert_eq!(state.xp_to_next_level, Exp(155));
        assert_eq!(state.total_xp, Exp(100));
    }

    #[test]
    fn large_award_carries_across_levels() {
        let state = Progression {
            level: 2,
            current_xp: Exp(30),
            xp_to_next_level: xp_to_next_level(2),
            total_xp: Exp(550),
        };
        let state = state.award(Exp(300));
        // 30 + 300 = 330 >= 220, one level up leaves 110 < 295.
        assert_eq!(state.level, 3);
        assert_eq!(state.current_xp, Exp(110));
        assert_eq!(state.xp_to_next_level, Exp(295));
        assert_eq!(state.total_xp, Exp(850));
    }

    #[test]
    fn invariant_holds_and_total_accumulates() {
        let amounts = [1u64, 7, 25, 99, 100, 154, 1_000, 25_000, 3];
        let mut state = Progression::initial();
        let mut sum = 0;
        for amount in amounts {
            state = state.award(Exp(amount));
            sum += amount;
            assert!(state.current_xp < state.xp_to_next_level);
            assert_eq!(state.xp_to_next_level, xp_to_next_level(state.level));
            assert_eq!(state.total_xp, Exp(sum));
        }
    }

    #[test]
    fn level_never_decreases() {
        let mut state = Progression::initial();
        let mut previous_level = state.level;
        for amount in [5u64, 500, 5, 5_000, 5] {
            state = state.award(Exp(amount));
            assert!(state.level >= previous_level);
            previous_level = state.level;
        }
    }
}
