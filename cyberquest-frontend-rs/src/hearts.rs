//! Heart regeneration and spending.
//!
//! Hearts are the attempt currency: capped at five, one lost per wrong
//! answer, one regained per five minutes of wall-clock time whether or not
//! the app is open. The host calls `CyberQuest::check_hearts` once at startup
//! (so a long-closed app catches up immediately) and then on a coarse
//! once-per-minute timer.

use chrono::{DateTime, Utc};

use crate::progress::UserState;

pub const MAX_HEARTS: u8 = 5;
pub const HEART_REGEN_INTERVAL_MS: i64 = 5 * 60 * 1000;

impl UserState {
    /// Credits whole elapsed regeneration units since `last_heart_regen`.
    ///
    /// Only whole five-minute units count and the timestamp jumps to `now`
    /// whenever at least one unit is credited, discarding any fractional
    /// remainder. That slightly undercounts across repeated short ticks, but
    /// it is the shipped product behavior and is kept as-is.
    ///
    /// At full hearts this is a no-op that leaves the timestamp alone, so a
    /// stale timestamp never grants a free head start once a heart is spent.
    pub fn regen_hearts(self, now: DateTime<Utc>) -> Self {
        if self.hearts >= MAX_HEARTS {
            return self;
        }
        let elapsed_ms = now.timestamp_millis() - self.last_heart_regen;
        let whole_units = elapsed_ms / HEART_REGEN_INTERVAL_MS;
        if whole_units < 1 {
            return self;
        }
        let credited = whole_units.min(i64::from(MAX_HEARTS)) as u8;
        Self {
            hearts: (self.hearts + credited).min(MAX_HEARTS),
            last_heart_regen: now.timestamp_millis(),
            ..self
        }
    }

    /// Removes one heart, saturating at zero. Spending from full restarts
    /// the regeneration clock at `now`; while capped, `last_heart_regen` was
    /// left stale on purpose and must not be trusted.
    pub fn spend_heart(self, now: DateTime<Utc>) -> Self {
        let last_heart_regen = if self.hearts == MAX_HEARTS {
            now.timestamp_millis()
        } else {
            self.last_heart_regen
        };
        Self {
            hearts: self.hearts.saturating_sub(1),
            last_heart_regen,
            ..self
        }
    }

    /// Hearts at zero is a first-class blocked state, not an error: the quiz
    /// pauses until regeneration or exit.
    pub fn out_of_hearts(&self) -> bool {
        self.hearts == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn minutes_later(minutes: i64) -> DateTime<Utc> {
        start() + chrono::Duration::minutes(minutes)
    }

    fn with_hearts(hearts: u8) -> UserState {
        UserState {
            hearts,
            ..UserState::initial(start())
        }
    }

    #[test]
    fn test_twelve_minutes_credit_two_hearts() {
        let state = with_hearts(2).regen_hearts(minutes_later(12));
        assert_eq!(state.hearts, 4);
        assert_eq!(
            state.last_heart_regen,
            minutes_later(12).timestamp_millis(),
            "timestamp advances to now when a unit is credited"
        );
    }

    #[test]
    fn test_partial_interval_credits_nothing() {
        let state = with_hearts(2).regen_hearts(minutes_later(4));
        assert_eq!(state.hearts, 2);
        assert_eq!(
            state.last_heart_regen,
            start().timestamp_millis(),
            "timestamp untouched when nothing was credited"
        );
    }

    #[test]
    fn test_fractional_remainder_is_discarded() {
        // 9 minutes pass: one unit credited, the 4-minute remainder dropped.
        let state = with_hearts(1).regen_hearts(minutes_later(9));
        assert_eq!(state.hearts, 2);
        // 4 more minutes (13 total) still credit nothing, because the clock
        // restarted at the 9-minute mark.
        let state = state.regen_hearts(minutes_later(13));
        assert_eq!(state.hearts, 2);
    }

    #[test]
    fn test_regen_caps_at_five() {
        let state = with_hearts(1).regen_hearts(minutes_later(60 * 24));
        assert_eq!(state.hearts, MAX_HEARTS);
    }

    #[test]
    fn test_full_hearts_tick_is_a_no_op() {
        let state = with_hearts(MAX_HEARTS);
        let before = state.last_heart_regen;
        let state = state.regen_hearts(minutes_later(60 * 24 * 7));
        assert_eq!(state.hearts, MAX_HEARTS);
        assert_eq!(state.last_heart_regen, before);
    }

    #[test]
    fn test_clock_skew_backwards_credits_nothing() {
        let state = with_hearts(2).regen_hearts(start() - chrono::Duration::minutes(30));
        assert_eq!(state.hearts, 2);
        assert_eq!(state.last_heart_regen, start().timestamp_millis());
    }

    #[test]
    fn test_spend_from_full_restarts_the_regen_clock() {
        let state = with_hearts(MAX_HEARTS).spend_heart(minutes_later(42));
        assert_eq!(state.hearts, 4);
        assert_eq!(state.last_heart_regen, minutes_later(42).timestamp_millis());
    }

    #[test]
    fn test_spend_below_full_preserves_the_regen_clock() {
        let state = with_hearts(3).spend_heart(minutes_later(42));
        assert_eq!(state.hearts, 2);
        assert_eq!(state.last_heart_regen, start().timestamp_millis());
    }

    #[test]
    fn test_spend_at_zero_stays_at_zero() {
        let state = with_hearts(0).spend_heart(minutes_later(1));
        assert_eq!(state.hearts, 0);
        assert!(state.out_of_hearts());
    }

    #[test]
    fn test_three_misses_from_full_leave_two_hearts() {
        let mut state = with_hearts(MAX_HEARTS);
        for minute in 0..3 {
            state = state.spend_heart(minutes_later(minute));
        }
        assert_eq!(state.hearts, 2);
    }

    #[test]
    fn test_spend_then_regen_round_trip() {
        let state = with_hearts(MAX_HEARTS).spend_heart(start());
        assert_eq!(state.hearts, 4);
        let state = state.regen_hearts(minutes_later(5));
        assert_eq!(state.hearts, MAX_HEARTS);
        // Back at the cap: further ticks are no-ops again.
        let before = state.last_heart_regen;
        let state = state.regen_hearts(minutes_later(25));
        assert_eq!(state.last_heart_regen, before);
    }
}
