//! [`InvocationThrottle`] – minimum spacing between oracle calls.
//!
//! Between two oracle invocations at least `min_interval` must elapse.  Change
//! sets that arrive inside the window are buffered instead of dropped, and a
//! small set of urgent conditions (combat starting, a severe HP drop, a new
//! status effect) bypass the window entirely.
//!
//! The throttle never reads the clock itself; every time-dependent call takes
//! an explicit [`Instant`] so tests stay deterministic.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use mudgate_kernel::throttle::{Admission, InvocationThrottle};
//! use mudgate_perception::ChangeSet;
//!
//! let mut throttle = InvocationThrottle::new(Duration::from_secs(2));
//! let t0 = Instant::now();
//!
//! assert_eq!(throttle.admit(ChangeSet::default(), t0), Admission::Invoke);
//! throttle.commit(t0);
//!
//! let soon = t0 + Duration::from_millis(500);
//! assert_eq!(throttle.admit(ChangeSet::default(), soon), Admission::Buffered);
//! assert!(throttle.has_pending());
//! ```

use std::time::{Duration, Instant};

use mudgate_perception::ChangeSet;
use tracing::{debug, info};

/// Default minimum time between two oracle calls.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(2);

/// What the session should do with a freshly observed change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed to classification and, possibly, an oracle call.
    Invoke,
    /// Inside the throttle window; the change set was buffered.
    Buffered,
}

/// Rate limiter with a pending buffer for oracle invocations.
#[derive(Debug, Clone)]
pub struct InvocationThrottle {
    min_interval: Duration,
    /// `None` is the "long ago" sentinel.
    last_invocation: Option<Instant>,
    pending: Vec<ChangeSet>,
}

impl Default for InvocationThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl InvocationThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_invocation: None,
            pending: Vec::new(),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// `true` while `now` is still inside the window opened by the last
    /// committed invocation.
    pub fn should_buffer(&self, now: Instant) -> bool {
        match self.last_invocation {
            Some(last) => now.saturating_duration_since(last) < self.min_interval,
            None => false,
        }
    }

    /// Append a change set to the pending buffer.
    pub fn record_pending(&mut self, changes: ChangeSet) {
        self.pending.push(changes);
    }

    /// Reset the window so the next check admits an invocation.
    pub fn force_immediate(&mut self) {
        self.last_invocation = None;
    }

    /// Record a completed invocation at `now` and drop the pending buffer.
    pub fn commit(&mut self, now: Instant) {
        self.last_invocation = Some(now);
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "pending change sets folded into invocation");
        }
        self.pending.clear();
    }

    /// `true` if `changes` must bypass the throttle window.
    pub fn is_force_trigger(changes: &ChangeSet) -> bool {
        if changes.combat == Some(true) {
            return true;
        }
        if changes.hp.is_some_and(|hp| hp.is_severe_drop()) {
            return true;
        }
        changes
            .status_effects
            .as_ref()
            .is_some_and(|added| !added.is_empty())
    }

    /// Combined gate: force triggers reopen the window, otherwise buffer while
    /// throttled.
    pub fn admit(&mut self, changes: ChangeSet, now: Instant) -> Admission {
        if Self::is_force_trigger(&changes) {
            info!(keys = ?changes.keys(), "force-immediate trigger bypasses throttle");
            self.force_immediate();
        }
        if self.should_buffer(now) {
            debug!(keys = ?changes.keys(), "throttled; change set buffered");
            self.record_pending(changes);
            Admission::Buffered
        } else {
            Admission::Invoke
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> &[ChangeSet] {
        &self.pending
    }

    /// Drain the pending buffer without touching the window.
    pub fn take_pending(&mut self) -> Vec<ChangeSet> {
        std::mem::take(&mut self.pending)
    }

    /// Forget the window and every buffered change set.
    pub fn reset(&mut self) {
        self.last_invocation = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use mudgate_perception::{StatusEffect, Vitals, VitalsChange};

    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn committed_at(t0: Instant) -> InvocationThrottle {
        let mut throttle = InvocationThrottle::new(Duration::from_secs(2));
        throttle.commit(t0);
        throttle
    }

    fn hp_change(before: u32, after: u32) -> ChangeSet {
        ChangeSet {
            hp: Some(VitalsChange {
                before: Vitals { hp: before, max_hp: 100 },
                after: Vitals { hp: after, max_hp: 100 },
            }),
            ..ChangeSet::default()
        }
    }

    #[test]
    fn fresh_throttle_never_buffers() {
        let throttle = InvocationThrottle::default();
        assert!(!throttle.should_buffer(Instant::now()));
        assert_eq!(throttle.min_interval(), DEFAULT_MIN_INTERVAL);
    }

    #[test]
    fn buffers_inside_window_and_opens_after() {
        let t0 = Instant::now();
        let throttle = committed_at(t0);
        assert!(throttle.should_buffer(t0 + ms(1999)));
        assert!(!throttle.should_buffer(t0 + ms(2000)));
    }

    #[test]
    fn buffered_changes_accumulate_until_commit() {
        let t0 = Instant::now();
        let mut throttle = committed_at(t0);
        let cs = ChangeSet {
            location: Some("a clearing".into()),
            ..ChangeSet::default()
        };

        assert_eq!(throttle.admit(cs.clone(), t0 + ms(100)), Admission::Buffered);
        assert_eq!(throttle.admit(cs, t0 + ms(200)), Admission::Buffered);
        assert_eq!(throttle.pending().len(), 2);

        assert_eq!(throttle.admit(ChangeSet::default(), t0 + ms(2100)), Admission::Invoke);
        throttle.commit(t0 + ms(2100));
        assert!(!throttle.has_pending());
    }

    #[test]
    fn combat_start_bypasses_window() {
        let t0 = Instant::now();
        let mut throttle = committed_at(t0);
        let cs = ChangeSet {
            combat: Some(true),
            ..ChangeSet::default()
        };
        assert_eq!(throttle.admit(cs, t0 + ms(100)), Admission::Invoke);
    }

    #[test]
    fn combat_end_does_not_bypass() {
        let cs = ChangeSet {
            combat: Some(false),
            ..ChangeSet::default()
        };
        assert!(!InvocationThrottle::is_force_trigger(&cs));
    }

    #[test]
    fn severe_hp_drop_bypasses_window() {
        assert!(InvocationThrottle::is_force_trigger(&hp_change(100, 40)));
        assert!(!InvocationThrottle::is_force_trigger(&hp_change(100, 50)));
        assert!(!InvocationThrottle::is_force_trigger(&hp_change(40, 100)));
    }

    #[test]
    fn new_status_effect_bypasses_window() {
        let t0 = Instant::now();
        let mut throttle = committed_at(t0);
        let cs = ChangeSet {
            status_effects: Some(BTreeSet::from([StatusEffect::Poisoned])),
            ..ChangeSet::default()
        };
        assert_eq!(throttle.admit(cs, t0 + ms(10)), Admission::Invoke);
    }

    #[test]
    fn force_immediate_reopens_window() {
        let t0 = Instant::now();
        let mut throttle = committed_at(t0);
        throttle.force_immediate();
        assert!(!throttle.should_buffer(t0 + ms(1)));
    }

    #[test]
    fn take_pending_keeps_window() {
        let t0 = Instant::now();
        let mut throttle = committed_at(t0);
        throttle.record_pending(ChangeSet::default());
        assert_eq!(throttle.take_pending().len(), 1);
        assert!(!throttle.has_pending());
        assert!(throttle.should_buffer(t0 + ms(1)));
    }

    #[test]
    fn reset_clears_everything() {
        let t0 = Instant::now();
        let mut throttle = committed_at(t0);
        throttle.record_pending(ChangeSet::default());
        throttle.reset();
        assert!(!throttle.has_pending());
        assert!(!throttle.should_buffer(t0 + ms(1)));
    }
}
