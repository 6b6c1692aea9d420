//! [`LoopDetector`] – repetitive-command cycle detector.
//!
//! Detects when the oracle keeps proposing the same short sequence of
//! commands, and suggests a breaker command that changes the agent's context
//! instead of burning more turns.
//!
//! # Algorithm
//!
//! The detector keeps a rolling window of the last commands (capacity 6 by
//! default).  After each [`LoopDetector::record_and_check`] call:
//!
//! - for pattern lengths 2 and 3, if the most recent *N* commands equal the
//!   *N* before them, repeated `repeat_threshold` times, a loop is declared;
//! - a single command issued `stutter_threshold` times in a row is also a
//!   loop.
//!
//! # Example
//!
//! ```rust
//! use mudgate_kernel::loop_detector::LoopDetector;
//!
//! let mut detector = LoopDetector::new(2);
//!
//! assert!(!detector.record_and_check("n"));
//! assert!(!detector.record_and_check("s"));
//! assert!(!detector.record_and_check("n"));
//! assert!(detector.record_and_check("s")); // [n, s] twice → loop
//!
//! detector.reset();
//! assert!(!detector.record_and_check("s"));
//! ```

use std::collections::{BTreeSet, VecDeque};

use mudgate_types::Direction;

use crate::commands::{explored_direction, is_look};

/// Minimum number of commands kept for cycle detection.
pub const HISTORY_CAPACITY: usize = 6;
/// How many back-to-back repetitions of a 2- or 3-command pattern make a loop.
pub const DEFAULT_REPEAT_THRESHOLD: usize = 2;
/// How many identical consecutive commands make a loop.
pub const DEFAULT_STUTTER_THRESHOLD: usize = 3;
/// Introspective breaker used after look-type loops.
pub const LOOK_SELF: &str = "look self";
/// Neutral status query used when nothing better is available.
pub const STATUS_QUERY: &str = "score";

const PATTERN_LENGTHS: [usize; 2] = [2, 3];

// ─────────────────────────────────────────────────────────────────────────────
// LoopDetector
// ─────────────────────────────────────────────────────────────────────────────

/// Detects when the oracle is stuck in a repetitive command cycle.
#[derive(Debug, Clone)]
pub struct LoopDetector {
    repeat_threshold: usize,
    stutter_threshold: usize,
    capacity: usize,
    /// Rolling window of normalized commands, oldest first.
    history: VecDeque<String>,
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new(DEFAULT_REPEAT_THRESHOLD)
    }
}

impl LoopDetector {
    /// Create a detector with the given pattern repeat threshold and the
    /// default stutter threshold.
    ///
    /// A `repeat_threshold` below 2 is raised to 2; a single occurrence of a
    /// pattern is not a loop.
    pub fn new(repeat_threshold: usize) -> Self {
        let repeat_threshold = repeat_threshold.max(2);
        Self {
            repeat_threshold,
            stutter_threshold: DEFAULT_STUTTER_THRESHOLD,
            capacity: Self::capacity_for(repeat_threshold, DEFAULT_STUTTER_THRESHOLD),
            history: VecDeque::new(),
        }
    }

    /// Override the identical-consecutive-command threshold. `0` disables it.
    pub fn with_stutter_threshold(mut self, stutter_threshold: usize) -> Self {
        self.stutter_threshold = stutter_threshold;
        self.capacity = Self::capacity_for(self.repeat_threshold, stutter_threshold);
        self
    }

    fn capacity_for(repeat_threshold: usize, stutter_threshold: usize) -> usize {
        let longest = PATTERN_LENGTHS.iter().max().copied().unwrap_or(3);
        HISTORY_CAPACITY
            .max(longest * repeat_threshold)
            .max(stutter_threshold)
    }

    /// Record that `command` is about to be sent.
    ///
    /// Returns `true` when the history now constitutes a loop.
    pub fn record_and_check(&mut self, command: &str) -> bool {
        self.history.push_back(command.trim().to_ascii_lowercase());
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
        self.is_looping()
    }

    /// `true` if the current history constitutes a loop.
    pub fn is_looping(&self) -> bool {
        self.is_stuttering() || PATTERN_LENGTHS.iter().any(|&n| self.repeats_pattern(n))
    }

    fn is_stuttering(&self) -> bool {
        let k = self.stutter_threshold;
        if k == 0 || self.history.len() < k {
            return false;
        }
        let mut tail = self.history.iter().skip(self.history.len() - k);
        let first = tail.next();
        tail.all(|c| Some(c) == first)
    }

    fn repeats_pattern(&self, n: usize) -> bool {
        let span = n * self.repeat_threshold;
        if self.history.len() < span {
            return false;
        }
        let tail: Vec<&String> = self.history.iter().skip(self.history.len() - span).collect();
        let last = &tail[span - n..];
        tail.chunks(n).all(|chunk| chunk == last)
    }

    /// Suggest a command that breaks the current cycle.
    ///
    /// Priority:
    /// 1. `peer <dir>` for a known exit not touched by a recent peer or
    ///    movement command;
    /// 2. [`LOOK_SELF`] if recent commands were look-type;
    /// 3. [`STATUS_QUERY`].
    pub fn suggest_alternative(&self, exits: &BTreeSet<Direction>) -> String {
        let recent: BTreeSet<Direction> = self
            .history
            .iter()
            .filter_map(|c| explored_direction(c))
            .collect();

        if let Some(fresh) = exits.iter().find(|d| !recent.contains(d)) {
            return format!("peer {}", fresh.short());
        }
        if self.history.iter().any(|c| is_look(c)) {
            return LOOK_SELF.to_string();
        }
        STATUS_QUERY.to_string()
    }

    /// Clear all recorded history.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Recorded commands, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_all(detector: &mut LoopDetector, commands: &[&str]) -> Vec<bool> {
        commands.iter().map(|c| detector.record_and_check(c)).collect()
    }

    fn exits(list: &[Direction]) -> BTreeSet<Direction> {
        list.iter().copied().collect()
    }

    #[test]
    fn alternating_pair_is_a_loop() {
        let mut d = LoopDetector::new(2);
        let flags = record_all(&mut d, &["n", "s", "n", "s", "n", "s"]);
        assert!(flags.iter().any(|&f| f));
        assert!(flags[5]);
        assert!(!flags[2], "one and a half repetitions is not a loop");
    }

    #[test]
    fn varied_commands_are_not_a_loop() {
        let mut d = LoopDetector::new(2);
        let flags = record_all(&mut d, &["n", "s", "e", "w", "n", "s"]);
        assert!(flags.iter().all(|&f| !f), "{flags:?}");
    }

    #[test]
    fn triple_pattern_is_a_loop() {
        let mut d = LoopDetector::new(2);
        let flags = record_all(&mut d, &["n", "e", "s", "n", "e", "s"]);
        assert_eq!(flags, vec![false, false, false, false, false, true]);
    }

    #[test]
    fn stutter_is_a_loop() {
        let mut d = LoopDetector::new(2);
        assert!(!d.record_and_check("n"));
        assert!(!d.record_and_check("n"));
        assert!(d.record_and_check("n"));
    }

    #[test]
    fn stutter_can_be_disabled() {
        let mut d = LoopDetector::new(2).with_stutter_threshold(0);
        assert!(!d.record_and_check("kill orc"));
        assert!(!d.record_and_check("kill orc"));
        assert!(!d.record_and_check("kill orc"));
        // Still caught as a repeated pair of identical commands.
        assert!(d.record_and_check("kill orc"));
    }

    #[test]
    fn commands_are_normalized() {
        let mut d = LoopDetector::new(2);
        record_all(&mut d, &["N", " s", "n ", "S"]);
        assert!(d.is_looping());
    }

    #[test]
    fn higher_threshold_needs_more_repetitions() {
        let mut d = LoopDetector::new(3);
        let flags = record_all(&mut d, &["n", "s", "n", "s", "n", "s"]);
        assert!(flags[..5].iter().all(|&f| !f));
        assert!(flags[5]);
    }

    #[test]
    fn history_is_bounded() {
        let mut d = LoopDetector::new(2);
        record_all(&mut d, &["a", "b", "c", "d", "e", "f", "g", "h"]);
        assert_eq!(d.len(), HISTORY_CAPACITY);
        assert_eq!(d.history().next(), Some("c"));
    }

    #[test]
    fn reset_clears_history() {
        let mut d = LoopDetector::new(2);
        record_all(&mut d, &["n", "s", "n", "s"]);
        assert!(d.is_looping());
        d.reset();
        assert!(d.is_empty());
        assert!(!d.record_and_check("n"));
    }

    #[test]
    fn suggestion_prefers_unexplored_exit() {
        let mut d = LoopDetector::new(2);
        record_all(&mut d, &["n", "peer e", "n", "peer e"]);
        let suggestion = d.suggest_alternative(&exits(&[
            Direction::North,
            Direction::East,
            Direction::West,
        ]));
        assert_eq!(suggestion, "peer w");
    }

    #[test]
    fn suggestion_falls_back_to_look_self() {
        let mut d = LoopDetector::new(2);
        record_all(&mut d, &["look", "n", "look", "n"]);
        assert_eq!(d.suggest_alternative(&exits(&[Direction::North])), LOOK_SELF);
    }

    #[test]
    fn suggestion_defaults_to_status_query() {
        let mut d = LoopDetector::new(2);
        record_all(&mut d, &["kill orc", "flee", "kill orc", "flee"]);
        assert_eq!(d.suggest_alternative(&BTreeSet::new()), STATUS_QUERY);
    }
}
