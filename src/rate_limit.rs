//! Hourly request quota tracking.
//!
//! Tracks usage against a fixed per-hour ceiling and decides whether a new
//! request may be sent right now. The window is optimistic local bookkeeping;
//! an explicit server throttle signal overrides it via [`QuotaTracker::force_cooldown`].

use std::time::Duration;

use tokio::time::Instant;

/// Length of the local quota window.
pub const WINDOW_DURATION: Duration = Duration::from_secs(60 * 60);

/// Buffer added to every rollover deadline to tolerate clock skew against
/// the remote service's own window.
pub const WINDOW_GRACE: Duration = Duration::from_secs(10);

/// Rolling request counter against an hourly ceiling.
///
/// Not internally synchronized; intended for a single sequential caller.
/// Concurrent use requires each caller to own its own tracker.
#[derive(Debug)]
pub struct QuotaTracker {
    requests_per_window: u32,
    requests_used: u32,
    window_reset_at: Option<Instant>,
    /// Set when the server itself signaled throttling; local checks are
    /// disabled until this deadline passes.
    cooldown_until: Option<Instant>,
}

impl QuotaTracker {
    /// Create a tracker with the given per-window ceiling.
    pub fn new(requests_per_window: u32) -> Self {
        Self {
            requests_per_window,
            requests_used: 0,
            window_reset_at: None,
            cooldown_until: None,
        }
    }

    /// Try to reserve a request slot in the current window.
    ///
    /// Rolls the window over when the reset deadline has passed (or the
    /// window was never started). Returns false when the ceiling is reached
    /// or a server cooldown is still active; the caller should wait until
    /// [`QuotaTracker::reset_at`].
    pub fn try_reserve_slot(&mut self) -> bool {
        let now = Instant::now();

        if let Some(until) = self.cooldown_until {
            if now < until {
                return false;
            }
        }

        let expired = self.window_reset_at.is_none_or(|reset| now >= reset);
        if expired {
            self.window_reset_at = Some(now + WINDOW_DURATION + WINDOW_GRACE);
            self.requests_used = 0;
            self.cooldown_until = None;
        }

        if self.requests_used < self.requests_per_window {
            self.requests_used += 1;
            true
        } else {
            false
        }
    }

    /// Apply a server-signaled cooldown, overriding local bookkeeping.
    ///
    /// Every reservation fails until the returned deadline passes, regardless
    /// of how much of the local ceiling was actually used. The remote
    /// limiter's window is independent of our hourly estimate, so its signal
    /// wins.
    pub fn force_cooldown(&mut self, cooldown: Duration) -> Instant {
        let until = Instant::now() + cooldown;
        self.cooldown_until = Some(until);
        self.window_reset_at = Some(until);
        until
    }

    /// Deadline after which a denied caller may try again.
    ///
    /// `None` until the first reservation attempt starts a window.
    pub fn reset_at(&self) -> Option<Instant> {
        self.window_reset_at
    }

    /// Requests granted in the current window.
    pub fn requests_used(&self) -> u32 {
        self.requests_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn grants_never_exceed_ceiling() {
        let mut tracker = QuotaTracker::new(5);
        for _ in 0..5 {
            assert!(tracker.try_reserve_slot());
        }
        assert!(!tracker.try_reserve_slot());
        assert!(!tracker.try_reserve_slot());
        assert_eq!(tracker.requests_used(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn window_rolls_over_after_reset_deadline() {
        let mut tracker = QuotaTracker::new(2);
        assert!(tracker.try_reserve_slot());
        assert!(tracker.try_reserve_slot());
        assert!(!tracker.try_reserve_slot());

        // Just short of the deadline: still denied.
        advance(WINDOW_DURATION + WINDOW_GRACE - Duration::from_secs(1)).await;
        assert!(!tracker.try_reserve_slot());

        advance(Duration::from_secs(2)).await;
        assert!(tracker.try_reserve_slot());
        assert_eq!(tracker.requests_used(), 1);
        assert!(tracker.try_reserve_slot());
    }

    #[tokio::test(start_paused = true)]
    async fn rollover_deadline_includes_grace() {
        let mut tracker = QuotaTracker::new(1);
        let start = Instant::now();
        assert!(tracker.try_reserve_slot());
        assert_eq!(tracker.reset_at(), Some(start + WINDOW_DURATION + WINDOW_GRACE));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_blocks_regardless_of_unused_quota() {
        let mut tracker = QuotaTracker::new(100);
        assert!(tracker.try_reserve_slot());

        let cooldown = Duration::from_secs(300);
        let until = tracker.force_cooldown(cooldown);
        assert_eq!(until, Instant::now() + cooldown);
        assert_eq!(tracker.reset_at(), Some(until));

        assert!(!tracker.try_reserve_slot());
        advance(Duration::from_secs(299)).await;
        assert!(!tracker.try_reserve_slot());

        advance(Duration::from_secs(2)).await;
        assert!(tracker.try_reserve_slot());
        assert_eq!(tracker.requests_used(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn untouched_tracker_has_no_deadline() {
        let tracker = QuotaTracker::new(10);
        assert_eq!(tracker.reset_at(), None);
    }
}
