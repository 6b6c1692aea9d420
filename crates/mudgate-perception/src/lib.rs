//! `mudgate-perception` – Text Perception layer.
//!
//! Turns chunked, noisy MUD server output into the compact structured view of
//! the game world that the oracle needs, and decides whether a fresh burst of
//! text carries enough new information to justify asking for a decision.
//!
//! # Modules
//!
//! - [`patterns`] – [`RuleTable`][patterns::RuleTable]: ordered
//!   `(tag, pattern)` tables for the critical, navigation, ignore, and
//!   sensitive categories, plus ANSI/line-ending cleanup.
//! - [`state_tracker`] – [`StateTracker`][state_tracker::StateTracker]:
//!   parses each text delta into [`WorldState`][state_tracker::WorldState]
//!   and reports what changed as a [`ChangeSet`][state_tracker::ChangeSet].
//! - [`classifier`] – [`ChangeClassifier`][classifier::ChangeClassifier]:
//!   stateless significance gate over the two most recent text snapshots.

pub mod classifier;
pub mod patterns;
pub mod state_tracker;

pub use classifier::{ChangeClassifier, Verdict};
pub use patterns::{clean_text, RuleTable};
pub use state_tracker::{ChangeSet, StateTracker, StatusEffect, Vitals, VitalsChange, WorldState};
