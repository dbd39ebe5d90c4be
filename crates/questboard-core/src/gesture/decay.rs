//! Unwinding of progress after an early release.
//!
//! Progress falls linearly at `1 / decay_duration_ms` per millisecond, so
//! a release at 0.9 takes nine times longer to settle than one at 0.1.
//! Like the hold itself, the decayed value is derived from absolute time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CancellationDecay {
    from_progress: f64,
    released_at_ms: u64,
    decay_duration_ms: u64,
}

impl CancellationDecay {
    pub fn new(from_progress: f64, released_at_ms: u64, decay_duration_ms: u64) -> Self {
        Self {
            from_progress: from_progress.clamp(0.0, 1.0),
            released_at_ms,
            decay_duration_ms: decay_duration_ms.max(1),
        }
    }

    pub fn from_progress(&self) -> f64 {
        self.from_progress
    }

    pub fn released_at_ms(&self) -> u64 {
        self.released_at_ms
    }

    /// Progress at `now_ms`, never above the release value and never below 0.
    pub fn progress_at(&self, now_ms: u64) -> f64 {
        let elapsed = now_ms.saturating_sub(self.released_at_ms) as f64;
        let fallen = elapsed / self.decay_duration_ms as f64;
        (self.from_progress - fallen).max(0.0)
    }

    pub fn is_settled(&self, now_ms: u64) -> bool {
        self.progress_at(now_ms) <= 0.0
    }

    /// Time from release until progress reaches zero.
    pub fn settle_ms(&self) -> u64 {
        (self.from_progress * self.decay_duration_ms as f64).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decays_linearly_to_zero() {
        let decay = CancellationDecay::new(0.8, 1_000, 400);
        assert!((decay.progress_at(1_000) - 0.8).abs() < 1e-9);
        assert!((decay.progress_at(1_100) - 0.55).abs() < 1e-9);
        assert_eq!(decay.progress_at(1_320), 0.0);
        assert!(decay.is_settled(1_320));
        assert_eq!(decay.settle_ms(), 320);
    }

    #[test]
    fn near_complete_release_unwinds_longer_than_barely_started() {
        let near = CancellationDecay::new(0.95, 0, 400);
        let barely = CancellationDecay::new(0.05, 0, 400);
        assert!(near.settle_ms() > barely.settle_ms());
        assert!(!near.is_settled(100));
        assert!(barely.is_settled(100));
    }

    #[test]
    fn samples_before_release_do_not_rise() {
        let decay = CancellationDecay::new(0.5, 2_000, 400);
        assert_eq!(decay.progress_at(1_500), 0.5);
    }

    proptest! {
        #[test]
        fn decay_is_non_increasing(
            start in 0.0f64..=1.0,
            duration in 1u64..5_000,
            a in 0u64..10_000,
            b in 0u64..10_000,
        ) {
            let decay = CancellationDecay::new(start, 0, duration);
            let (early, late) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(decay.progress_at(late) <= decay.progress_at(early));
            prop_assert!(decay.progress_at(duration) == 0.0);
        }
    }
}
