//! Anchor-based reconciliation arithmetic
//!
//! Elapsed time is always recomputed from the anchor instant and the banked
//! baseline, never incremented per tick. Calling [`reconcile`] once after a
//! long suspension gives the same answer as calling it every second.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of one cycle ("day") in seconds
pub const CYCLE_LENGTH_SECONDS: f64 = 86_400.0;

/// Progress within the tracked habit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Full cycles finished
    pub completed_cycles: u64,
    /// Seconds into the current cycle, always in `[0, CYCLE_LENGTH_SECONDS)`
    pub accumulated_seconds: f64,
}

impl Progress {
    pub const ZERO: Progress = Progress {
        completed_cycles: 0,
        accumulated_seconds: 0.0,
    };

    /// Build a progress value, carrying any whole cycles out of `seconds`.
    pub fn normalized(completed_cycles: u64, seconds: f64) -> Self {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let mut carried = (seconds / CYCLE_LENGTH_SECONDS).floor();
        let mut rest = seconds - carried * CYCLE_LENGTH_SECONDS;

        // Float division can land one ulp on the wrong side of a boundary.
        if rest < 0.0 {
            carried -= 1.0;
            rest += CYCLE_LENGTH_SECONDS;
        } else if rest >= CYCLE_LENGTH_SECONDS {
            carried += 1.0;
            rest -= CYCLE_LENGTH_SECONDS;
        }

        Self {
            completed_cycles: completed_cycles.saturating_add(carried as u64),
            accumulated_seconds: rest,
        }
    }

    /// Fraction of the current cycle elapsed, clamped to `[0, 1]`
    pub fn fraction(&self) -> f64 {
        (self.accumulated_seconds / CYCLE_LENGTH_SECONDS).clamp(0.0, 1.0)
    }

    /// Zero-padded `HH:MM:SS` of the in-cycle seconds, truncated to whole seconds
    pub fn time_string(&self) -> String {
        let total = self.accumulated_seconds.max(0.0) as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// Seconds between `anchor` and `now`, clamped at zero when the clock went backwards.
pub fn elapsed_seconds(anchor: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = now.signed_duration_since(anchor).num_milliseconds();
    (millis.max(0) as f64) / 1000.0
}

/// Progress at `now` for an interval that started at `anchor` on top of `baseline`.
///
/// This is the only place the cycle arithmetic lives; the live engine and the
/// at-exit flush both go through it.
pub fn reconcile(baseline: Progress, anchor: DateTime<Utc>, now: DateTime<Utc>) -> Progress {
    let total = elapsed_seconds(anchor, now) + baseline.accumulated_seconds;
    Progress::normalized(baseline.completed_cycles, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 19, 8, 0, 0).unwrap()
    }

    #[test]
    fn relaunch_after_a_day_and_change() {
        let now = t0() + Duration::seconds(90_500);
        let progress = reconcile(Progress::ZERO, t0(), now);
        assert_eq!(progress.completed_cycles, 1);
        assert_eq!(progress.accumulated_seconds, 4_100.0);
    }

    #[test]
    fn exact_boundary_carries_over() {
        let progress = reconcile(Progress::ZERO, t0(), t0() + Duration::seconds(86_400));
        assert_eq!(progress, Progress { completed_cycles: 1, accumulated_seconds: 0.0 });
    }

    #[test]
    fn baseline_is_added_before_carry() {
        let baseline = Progress { completed_cycles: 2, accumulated_seconds: 86_000.0 };
        let progress = reconcile(baseline, t0(), t0() + Duration::seconds(500));
        assert_eq!(progress.completed_cycles, 3);
        assert_eq!(progress.accumulated_seconds, 100.0);
    }

    #[test]
    fn clock_moving_backwards_contributes_nothing() {
        let baseline = Progress { completed_cycles: 1, accumulated_seconds: 42.0 };
        let progress = reconcile(baseline, t0(), t0() - Duration::seconds(3_600));
        assert_eq!(progress, baseline);
    }

    #[test]
    fn sub_second_precision_is_kept_but_display_truncates() {
        let progress = reconcile(Progress::ZERO, t0(), t0() + Duration::milliseconds(3_661_900));
        assert_eq!(progress.time_string(), "01:01:01");
        assert!((progress.accumulated_seconds - 3_661.9).abs() < 1e-9);
    }

    #[test]
    fn fraction_and_time_string() {
        let half = Progress { completed_cycles: 0, accumulated_seconds: 43_200.0 };
        assert_eq!(half.fraction(), 0.5);
        assert_eq!(half.time_string(), "12:00:00");
        assert_eq!(Progress::ZERO.time_string(), "00:00:00");
    }

    #[test]
    fn normalized_rejects_garbage() {
        assert_eq!(Progress::normalized(4, f64::NAN), Progress { completed_cycles: 4, accumulated_seconds: 0.0 });
        assert_eq!(Progress::normalized(4, -10.0).accumulated_seconds, 0.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn coarse_reconcile_matches_per_second_reconcile(
            baseline_secs in 0.0f64..CYCLE_LENGTH_SECONDS,
            baseline_cycles in 0u64..1_000,
            elapsed in 0i64..200_000,
        ) {
            let baseline = Progress { completed_cycles: baseline_cycles, accumulated_seconds: baseline_secs };
            let coarse = reconcile(baseline, t0(), t0() + Duration::seconds(elapsed));

            let mut previous = baseline;
            for second in 0..=elapsed {
                let fine = reconcile(baseline, t0(), t0() + Duration::seconds(second));
                prop_assert!(fine.accumulated_seconds >= 0.0);
                prop_assert!(fine.accumulated_seconds < CYCLE_LENGTH_SECONDS);
                prop_assert!(fine.completed_cycles >= previous.completed_cycles);
                prop_assert!(fine.completed_cycles - previous.completed_cycles <= 1);
                previous = fine;
            }
            prop_assert_eq!(previous, coarse);
        }

        #[test]
        fn suspension_of_whole_cycles_plus_remainder(
            cycles in 0u64..30,
            remainder in 0i64..86_400,
        ) {
            let elapsed = cycles as i64 * 86_400 + remainder;
            let progress = reconcile(Progress::ZERO, t0(), t0() + Duration::seconds(elapsed));
            prop_assert_eq!(progress.completed_cycles, cycles);
            prop_assert_eq!(progress.accumulated_seconds, remainder as f64);
        }
    }
}
