//! [`CommandValidator`] – single interception point between the oracle and the
//! transport.
//!
//! Every proposed command, whether it came from the oracle or from the
//! manual-override console, must pass through [`CommandValidator::validate`]
//! before it is written to the server.  Checks run in order:
//!
//! 1. **Loop check** ([`LoopDetector`]): if the command completes a repeating
//!    cycle it is replaced by the detector's breaker suggestion and the
//!    history is cleared.
//! 2. **Peer passthrough**: `peer <dir>` is always allowed; peering at a
//!    blocked direction is harmless and informative.
//! 3. **Exit consistency**: a bare or `go`-prefixed movement towards a
//!    direction not in the known exits is redirected to the first known exit,
//!    or turned into `peer <dir>` when no exits are known yet.
//! 4. Everything else passes through untouched, original casing included.
//!
//! Empty proposals are suppressed (`None`).
//!
//! # Example
//!
//! ```
//! use mudgate_kernel::{CommandValidator, LoopDetector, RewriteReason};
//! use mudgate_perception::StateTracker;
//!
//! let mut tracker = StateTracker::new();
//! tracker.update("Obvious exits: south");
//!
//! let mut validator = CommandValidator::new(LoopDetector::default());
//!
//! let ok = validator.validate("s", tracker.state()).unwrap();
//! assert_eq!(ok.command, "s");
//! assert!(ok.rewrite.is_none());
//!
//! let redirected = validator.validate("n", tracker.state()).unwrap();
//! assert_eq!(redirected.command, "s");
//! assert!(matches!(redirected.rewrite, Some(RewriteReason::UnknownExit { .. })));
//! ```

use std::fmt;

use mudgate_perception::WorldState;
use mudgate_types::Direction;
use tracing::{debug, warn};

use crate::commands::{movement_direction, peer_direction};
use crate::loop_detector::LoopDetector;

/// Why a proposed command was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteReason {
    /// The command completed a repeating cycle.
    LoopBroken { original: String },
    /// Movement towards a direction not in the current exit set.
    UnknownExit { requested: Direction },
    /// Movement requested while no exits are known.
    NoExitsKnown { requested: Direction },
}

impl fmt::Display for RewriteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteReason::LoopBroken { original } => {
                write!(f, "loop detected after `{original}`")
            }
            RewriteReason::UnknownExit { requested } => {
                write!(f, "no exit {requested} from here")
            }
            RewriteReason::NoExitsKnown { requested } => {
                write!(f, "exits unknown, peeking {requested} first")
            }
        }
    }
}

/// A command cleared for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    pub command: String,
    /// Present when `command` differs from what was proposed.
    pub rewrite: Option<RewriteReason>,
}

impl Validated {
    fn accepted(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            rewrite: None,
        }
    }

    fn rewritten(command: impl Into<String>, reason: RewriteReason) -> Self {
        Self {
            command: command.into(),
            rewrite: Some(reason),
        }
    }
}

/// The gate every command passes before reaching the transport.
#[derive(Debug, Default)]
pub struct CommandValidator {
    loop_detector: LoopDetector,
}

impl CommandValidator {
    pub fn new(loop_detector: LoopDetector) -> Self {
        Self { loop_detector }
    }

    pub fn loop_detector(&self) -> &LoopDetector {
        &self.loop_detector
    }

    /// Clear the loop history.
    pub fn reset(&mut self) {
        self.loop_detector.reset();
    }

    /// Check `proposed` against loop history and `world`.
    ///
    /// Returns `None` when the proposal is empty and nothing should be sent.
    pub fn validate(&mut self, proposed: &str, world: &WorldState) -> Option<Validated> {
        let command = proposed.trim();
        if command.is_empty() {
            debug!("empty proposal suppressed");
            return None;
        }

        if self.loop_detector.record_and_check(command) {
            let breaker = self.loop_detector.suggest_alternative(world.exits());
            warn!(original = command, breaker = %breaker, "command loop broken");
            self.loop_detector.reset();
            return Some(Validated::rewritten(
                breaker,
                RewriteReason::LoopBroken {
                    original: command.to_string(),
                },
            ));
        }

        if peer_direction(command).is_some() {
            return Some(Validated::accepted(command));
        }

        if let Some(requested) = movement_direction(command) {
            let exits = world.exits();
            if exits.contains(&requested) {
                return Some(Validated::accepted(command));
            }
            let validated = match exits.iter().next() {
                Some(known) => Validated::rewritten(
                    known.short(),
                    RewriteReason::UnknownExit { requested },
                ),
                None => Validated::rewritten(
                    format!("peer {}", requested.short()),
                    RewriteReason::NoExitsKnown { requested },
                ),
            };
            debug!(original = command, replacement = %validated.command, "movement redirected");
            return Some(validated);
        }

        Some(Validated::accepted(command))
    }
}

#[cfg(test)]
mod tests {
    use mudgate_perception::StateTracker;

    use super::*;

    fn world(text: &str) -> StateTracker {
        let mut tracker = StateTracker::new();
        tracker.update(text);
        tracker
    }

    fn validate(cmd: &str, tracker: &StateTracker) -> Option<Validated> {
        CommandValidator::default().validate(cmd, tracker.state())
    }

    #[test]
    fn movement_without_known_exits_becomes_peer() {
        let tracker = StateTracker::new();
        let v = validate("n", &tracker).unwrap();
        assert_eq!(v.command, "peer n");
        assert_eq!(
            v.rewrite,
            Some(RewriteReason::NoExitsKnown {
                requested: Direction::North
            })
        );
    }

    #[test]
    fn movement_to_unknown_exit_is_redirected() {
        let tracker = world("Exits: south");
        let v = validate("n", &tracker).unwrap();
        assert_eq!(v.command, "s");
        assert_eq!(
            v.rewrite,
            Some(RewriteReason::UnknownExit {
                requested: Direction::North
            })
        );
    }

    #[test]
    fn redirect_uses_first_exit_in_canonical_order() {
        let tracker = world("Obvious exits: west, up, east");
        assert_eq!(validate("north", &tracker).unwrap().command, "e");
    }

    #[test]
    fn known_exit_passes_with_original_text() {
        let tracker = world("Obvious exits: north, east");
        let v = validate("Go North", &tracker).unwrap();
        assert_eq!(v.command, "Go North");
        assert!(v.rewrite.is_none());
    }

    #[test]
    fn peer_always_passes() {
        let tracker = world("Exits: south");
        let v = validate("peer n", &tracker).unwrap();
        assert_eq!(v.command, "peer n");
        assert!(v.rewrite.is_none());
    }

    #[test]
    fn free_form_commands_keep_casing() {
        let tracker = StateTracker::new();
        let v = validate("Kill Orc", &tracker).unwrap();
        assert_eq!(v.command, "Kill Orc");
        assert!(v.rewrite.is_none());
    }

    #[test]
    fn empty_proposal_is_suppressed() {
        let tracker = StateTracker::new();
        assert!(validate("", &tracker).is_none());
        assert!(validate("   \n", &tracker).is_none());
    }

    #[test]
    fn loop_is_replaced_by_breaker_and_history_cleared() {
        let tracker = world("Obvious exits: north, south, east");
        let mut validator = CommandValidator::default();
        let state = tracker.state();

        assert_eq!(validator.validate("n", state).unwrap().command, "n");
        assert_eq!(validator.validate("s", state).unwrap().command, "s");
        assert_eq!(validator.validate("n", state).unwrap().command, "n");

        let v = validator.validate("s", state).unwrap();
        assert_eq!(v.command, "peer e");
        assert_eq!(
            v.rewrite,
            Some(RewriteReason::LoopBroken {
                original: "s".into()
            })
        );
        assert!(validator.loop_detector().is_empty());
    }

    #[test]
    fn rewrite_reason_display() {
        let reason = RewriteReason::UnknownExit {
            requested: Direction::North,
        };
        assert_eq!(reason.to_string(), "no exit north from here");
    }
}
