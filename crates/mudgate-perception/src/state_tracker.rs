//! World-State Tracker.
//!
//! Parses each (cleaned) text delta from the server into a compact
//! [`WorldState`] and reports which attributes changed as a [`ChangeSet`].
//!
//! Every extraction rule is applied independently and every match is
//! optional; text that matches nothing simply yields an empty change set.
//! The tracker never fails on malformed input.
//!
//! # Example
//!
//! ```rust
//! use mudgate_perception::state_tracker::StateTracker;
//! use mudgate_types::Direction;
//!
//! let mut tracker = StateTracker::new();
//! let changes = tracker.update("You are in a clearing. Obvious exits: north, east.");
//!
//! assert_eq!(changes.location.as_deref(), Some("a clearing"));
//! assert!(tracker.state().exits().contains(&Direction::North));
//!
//! // The same exit line again is not a change.
//! let again = tracker.update("Obvious exits: north, east.");
//! assert!(again.exits.is_none());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use mudgate_types::Direction;
use regex::Regex;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Extraction patterns
// ─────────────────────────────────────────────────────────────────────────────

static HP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"HP:\s*(\d+)\s*/\s*(\d+)").expect("hp regex"));

static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"You are in ([^.\n]+)").expect("location regex"));

static EXITS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:obvious exits|you see exits|exits):[ \t]*([^\n]*)").expect("exits regex")
});

static DIRECTION_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(northeast|northwest|southeast|southwest|north|south|east|west|up|down|ne|nw|se|sw)\b",
    )
    .expect("direction regex")
});

static MOVEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bYou (?:go|move|walk|run|swim|climb|fly) (\w+)").expect("movement regex")
});

static COMBAT_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:attacks? you|you are attacked|hits? you|you attack|you hit|misses you|you miss|bites you|claws you|damages? you)\b",
    )
    .expect("combat start regex")
});

static COMBAT_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:is dead|dies|you killed|you feel more experienced|r\.i\.p)")
        .expect("combat end regex")
});

// ─────────────────────────────────────────────────────────────────────────────
// Value types
// ─────────────────────────────────────────────────────────────────────────────

/// A condition tag the tracker recognises by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusEffect {
    Poisoned,
    Hungry,
    Thirsty,
    Exhausted,
}

impl StatusEffect {
    pub const ALL: [StatusEffect; 4] = [
        StatusEffect::Poisoned,
        StatusEffect::Hungry,
        StatusEffect::Thirsty,
        StatusEffect::Exhausted,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StatusEffect::Poisoned => "poisoned",
            StatusEffect::Hungry => "hungry",
            StatusEffect::Thirsty => "thirsty",
            StatusEffect::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for StatusEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Last-known vitals. `0` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vitals {
    pub hp: u32,
    pub max_hp: u32,
}

/// Vitals before and after one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VitalsChange {
    pub before: Vitals,
    pub after: Vitals,
}

impl VitalsChange {
    /// `true` when HP fell by more than half of its pre-change value.
    pub fn is_severe_drop(&self) -> bool {
        let before = self.before.hp;
        before > 0 && self.after.hp < before && (before - self.after.hp) * 2 > before
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChangeSet
// ─────────────────────────────────────────────────────────────────────────────

/// What one [`StateTracker::update`] call changed.
///
/// A `None` field means "no change detected for that attribute", never "the
/// value is empty".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub hp: Option<VitalsChange>,
    pub location: Option<String>,
    pub exits: Option<BTreeSet<Direction>>,
    /// The word following a movement verb; recorded even when repeated.
    pub movement: Option<String>,
    /// New combat state, present only on a transition.
    pub combat: Option<bool>,
    /// Effects added by this update.
    pub status_effects: Option<BTreeSet<StatusEffect>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Names of the attributes present in this change set.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.hp.is_some() {
            keys.push("hp");
        }
        if self.location.is_some() {
            keys.push("location");
        }
        if self.exits.is_some() {
            keys.push("exits");
        }
        if self.movement.is_some() {
            keys.push("movement");
        }
        if self.combat.is_some() {
            keys.push("combat");
        }
        if self.status_effects.is_some() {
            keys.push("statusEffects");
        }
        keys
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WorldState
// ─────────────────────────────────────────────────────────────────────────────

/// Compact structured view of the game world.
///
/// Only [`StateTracker`] mutates it; everything downstream reads it.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    vitals: Vitals,
    location: String,
    location_repeats: u32,
    exits: BTreeSet<Direction>,
    status_effects: BTreeSet<StatusEffect>,
    in_combat: bool,
    last_command: Option<String>,
}

impl WorldState {
    pub fn hp(&self) -> u32 {
        self.vitals.hp
    }

    pub fn max_hp(&self) -> u32 {
        self.vitals.max_hp
    }

    pub fn vitals(&self) -> Vitals {
        self.vitals
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// How many consecutive times the current location was re-read unchanged.
    pub fn location_repeats(&self) -> u32 {
        self.location_repeats
    }

    pub fn exits(&self) -> &BTreeSet<Direction> {
        &self.exits
    }

    pub fn status_effects(&self) -> &BTreeSet<StatusEffect> {
        &self.status_effects
    }

    pub fn in_combat(&self) -> bool {
        self.in_combat
    }

    pub fn last_command(&self) -> Option<&str> {
        self.last_command.as_deref()
    }

    /// Render a compact one-line summary for the oracle context.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.vitals.max_hp > 0 {
            parts.push(format!("HP: {}/{}", self.vitals.hp, self.vitals.max_hp));
        } else {
            parts.push("HP: unknown".to_string());
        }
        if self.location.is_empty() {
            parts.push("Location: unknown".to_string());
        } else if self.location_repeats >= 2 {
            parts.push(format!(
                "Location: {} (seen {} times in a row)",
                self.location,
                self.location_repeats + 1
            ));
        } else {
            parts.push(format!("Location: {}", self.location));
        }
        if self.exits.is_empty() {
            parts.push("Exits: none known".to_string());
        } else {
            let exits: Vec<&str> = self.exits.iter().map(|d| d.full_name()).collect();
            parts.push(format!("Exits: {}", exits.join(", ")));
        }
        if self.in_combat {
            parts.push("In combat".to_string());
        }
        if !self.status_effects.is_empty() {
            let effects: Vec<&str> = self.status_effects.iter().map(|e| e.name()).collect();
            parts.push(format!("Effects: {}", effects.join(", ")));
        }
        if let Some(cmd) = &self.last_command {
            parts.push(format!("Last command: {cmd}"));
        }
        parts.join(" | ")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StateTracker
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the session's [`WorldState`] and updates it from text deltas.
#[derive(Debug, Default)]
pub struct StateTracker {
    state: WorldState,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the tracked world.
    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Remember the command most recently sent to the server.
    pub fn record_command(&mut self, command: &str) {
        self.state.last_command = Some(command.to_string());
    }

    /// Apply every extraction rule to `text` and return what changed.
    pub fn update(&mut self, text: &str) -> ChangeSet {
        let mut changes = ChangeSet::default();

        self.apply_vitals(text, &mut changes);
        self.apply_location(text, &mut changes);
        self.apply_exits(text, &mut changes);

        if let Some(caps) = MOVEMENT_RE.captures_iter(text).last() {
            changes.movement = Some(caps[1].to_string());
        }

        self.apply_combat(text, &mut changes);
        self.apply_status_effects(text, &mut changes);

        if !changes.is_empty() {
            debug!(keys = ?changes.keys(), "world state changed");
        }
        changes
    }

    fn apply_vitals(&mut self, text: &str, changes: &mut ChangeSet) {
        let Some(caps) = HP_RE.captures_iter(text).last() else {
            return;
        };
        let (Ok(hp), Ok(max_hp)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            return;
        };
        let after = Vitals { hp, max_hp };
        if after != self.state.vitals {
            changes.hp = Some(VitalsChange {
                before: self.state.vitals,
                after,
            });
            self.state.vitals = after;
        }
    }

    fn apply_location(&mut self, text: &str, changes: &mut ChangeSet) {
        let Some(caps) = LOCATION_RE.captures_iter(text).last() else {
            return;
        };
        let location = caps[1].trim();
        if location.is_empty() {
            return;
        }
        if location == self.state.location {
            self.state.location_repeats += 1;
        } else {
            self.state.location = location.to_string();
            self.state.location_repeats = 0;
            changes.location = Some(location.to_string());
        }
    }

    fn apply_exits(&mut self, text: &str, changes: &mut ChangeSet) {
        let Some(caps) = EXITS_RE.captures_iter(text).last() else {
            return;
        };
        let exits = parse_exit_list(&caps[1]);
        if exits != self.state.exits {
            self.state.exits = exits.clone();
            changes.exits = Some(exits);
        }
    }

    fn apply_combat(&mut self, text: &str, changes: &mut ChangeSet) {
        let in_combat = if COMBAT_END_RE.is_match(text) {
            false
        } else if COMBAT_START_RE.is_match(text) {
            true
        } else {
            return;
        };
        if in_combat != self.state.in_combat {
            self.state.in_combat = in_combat;
            changes.combat = Some(in_combat);
        }
    }

    fn apply_status_effects(&mut self, text: &str, changes: &mut ChangeSet) {
        let lower = text.to_lowercase();
        let added: BTreeSet<StatusEffect> = StatusEffect::ALL
            .into_iter()
            .filter(|e| lower.contains(e.name()) && !self.state.status_effects.contains(e))
            .collect();
        if !added.is_empty() {
            self.state.status_effects.extend(added.iter().copied());
            changes.status_effects = Some(added);
        }
    }
}

/// Parse the text after `Exits:` into a set of directions.
///
/// `none` (with or without a trailing period) and an empty capture both yield
/// an empty set.
fn parse_exit_list(raw: &str) -> BTreeSet<Direction> {
    let trimmed = raw.trim().trim_end_matches('.').trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return BTreeSet::new();
    }
    DIRECTION_TOKEN_RE
        .find_iter(trimmed)
        .filter_map(|m| Direction::from_token(m.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs(list: &[Direction]) -> BTreeSet<Direction> {
        list.iter().copied().collect()
    }

    // ------------------------------------------------------------------ vitals

    #[test]
    fn hp_reading_updates_vitals_and_reports_change() {
        let mut t = StateTracker::new();
        let cs = t.update("HP: 80/100");
        assert_eq!(t.state().hp(), 80);
        assert_eq!(t.state().max_hp(), 100);
        let change = cs.hp.expect("hp key present");
        assert_eq!(change.before, Vitals::default());
        assert_eq!(change.after, Vitals { hp: 80, max_hp: 100 });
    }

    #[test]
    fn identical_hp_reading_is_not_a_change() {
        let mut t = StateTracker::new();
        t.update("HP: 80/100");
        let cs = t.update("Some text. HP: 80/100");
        assert!(cs.hp.is_none());
        assert_eq!(t.state().hp(), 80);
    }

    #[test]
    fn max_hp_change_alone_is_reported() {
        let mut t = StateTracker::new();
        t.update("HP: 80/100");
        let cs = t.update("HP: 80/120");
        assert!(cs.hp.is_some());
        assert_eq!(t.state().max_hp(), 120);
    }

    #[test]
    fn severe_drop_detection() {
        let drop = VitalsChange {
            before: Vitals { hp: 100, max_hp: 100 },
            after: Vitals { hp: 40, max_hp: 100 },
        };
        assert!(drop.is_severe_drop());

        let half = VitalsChange {
            before: Vitals { hp: 100, max_hp: 100 },
            after: Vitals { hp: 50, max_hp: 100 },
        };
        assert!(!half.is_severe_drop(), "exactly 50% is not more than half");

        let from_unknown = VitalsChange {
            before: Vitals::default(),
            after: Vitals { hp: 10, max_hp: 100 },
        };
        assert!(!from_unknown.is_severe_drop());
    }

    #[test]
    fn overflowing_hp_is_ignored() {
        let mut t = StateTracker::new();
        let cs = t.update("HP: 99999999999999/100");
        assert!(cs.hp.is_none());
        assert_eq!(t.state().hp(), 0);
    }

    // ------------------------------------------------------------------ location

    #[test]
    fn location_change_and_repeat_counter() {
        let mut t = StateTracker::new();
        let cs = t.update("You are in a dark forest.");
        assert_eq!(cs.location.as_deref(), Some("a dark forest"));
        assert_eq!(t.state().location_repeats(), 0);

        let cs = t.update("You are in a dark forest.");
        assert!(cs.location.is_none());
        assert_eq!(t.state().location_repeats(), 1);

        let cs = t.update("You are in a meadow.");
        assert_eq!(cs.location.as_deref(), Some("a meadow"));
        assert_eq!(t.state().location_repeats(), 0);
    }

    // ------------------------------------------------------------------ exits

    #[test]
    fn exits_are_parsed_and_abbreviations_normalized() {
        let mut t = StateTracker::new();
        let cs = t.update("Obvious exits: north, ne and sw.");
        let expected = dirs(&[Direction::North, Direction::Northeast, Direction::Southwest]);
        assert_eq!(cs.exits.as_ref(), Some(&expected));
        assert_eq!(t.state().exits(), &expected);
    }

    #[test]
    fn exits_parsing_is_idempotent() {
        let mut t = StateTracker::new();
        assert!(t.update("Exits: north, east").exits.is_some());
        assert!(t.update("Exits: north, east").exits.is_none());
    }

    #[test]
    fn exits_replace_rather_than_merge() {
        let mut t = StateTracker::new();
        t.update("You see exits: north, east");
        let cs = t.update("You see exits: south");
        assert_eq!(cs.exits, Some(dirs(&[Direction::South])));
        assert_eq!(t.state().exits(), &dirs(&[Direction::South]));
    }

    #[test]
    fn exits_none_clears_the_set() {
        let mut t = StateTracker::new();
        t.update("Obvious exits: north, east.");
        let cs = t.update("Exits: none.");
        assert_eq!(cs.exits, Some(BTreeSet::new()));
        assert!(t.state().exits().is_empty());

        // Still empty, nothing to report.
        assert!(t.update("Exits: none").exits.is_none());
    }

    #[test]
    fn empty_exit_capture_clears_the_set() {
        let mut t = StateTracker::new();
        t.update("Exits: west");
        let cs = t.update("Exits:\nA troll is here.");
        assert_eq!(cs.exits, Some(BTreeSet::new()));
    }

    #[test]
    fn compound_directions_are_not_split() {
        let mut t = StateTracker::new();
        t.update("Exits: northeast, southwest, up");
        assert_eq!(
            t.state().exits(),
            &dirs(&[Direction::Northeast, Direction::Southwest, Direction::Up])
        );
    }

    #[test]
    fn most_recent_exit_line_wins() {
        let mut t = StateTracker::new();
        t.update("Exits: north\nYou walk north.\nExits: west");
        assert_eq!(t.state().exits(), &dirs(&[Direction::West]));
    }

    // ------------------------------------------------------------------ movement / combat

    #[test]
    fn movement_is_recorded_even_when_repeated() {
        let mut t = StateTracker::new();
        assert_eq!(t.update("You walk north.").movement.as_deref(), Some("north"));
        assert_eq!(t.update("You walk north.").movement.as_deref(), Some("north"));
        assert_eq!(t.update("You swim across.").movement.as_deref(), Some("across"));
    }

    #[test]
    fn combat_transitions() {
        let mut t = StateTracker::new();
        let cs = t.update("You are attacked by a wolf!");
        assert_eq!(cs.combat, Some(true));
        assert!(t.state().in_combat());

        // Still fighting: no transition, no key.
        assert!(t.update("The wolf bites you.").combat.is_none());

        let cs = t.update("The wolf is dead. You feel more experienced.");
        assert_eq!(cs.combat, Some(false));
        assert!(!t.state().in_combat());
    }

    #[test]
    fn resolution_wins_within_one_delta() {
        let mut t = StateTracker::new();
        let cs = t.update("You attack the rat. The rat is dead.");
        assert!(cs.combat.is_none(), "never entered combat");
        assert!(!t.state().in_combat());
    }

    // ------------------------------------------------------------------ status effects

    #[test]
    fn status_effects_accumulate_and_never_clear() {
        let mut t = StateTracker::new();
        let cs = t.update("You feel Poisoned.");
        assert_eq!(cs.status_effects, Some([StatusEffect::Poisoned].into_iter().collect()));

        // Already known: not reported again.
        assert!(t.update("You are poisoned.").status_effects.is_none());

        let cs = t.update("You are no longer poisoned. You are hungry.");
        assert_eq!(cs.status_effects, Some([StatusEffect::Hungry].into_iter().collect()));
        assert!(t.state().status_effects().contains(&StatusEffect::Poisoned));
    }

    // ------------------------------------------------------------------ misc

    #[test]
    fn unmatched_text_yields_empty_change_set() {
        let mut t = StateTracker::new();
        let cs = t.update("\u{0}\u{7f} garbled ### HP: x/y");
        assert!(cs.is_empty());
        assert!(cs.keys().is_empty());
    }

    #[test]
    fn keys_use_attribute_names() {
        let mut t = StateTracker::new();
        let cs = t.update("You are in a clearing. Obvious exits: north, east. HP: 5/10");
        assert_eq!(cs.keys(), vec!["hp", "location", "exits"]);
    }

    #[test]
    fn summary_reflects_state() {
        let mut t = StateTracker::new();
        assert!(t.state().summary().contains("HP: unknown"));

        t.update("You are in a clearing. Obvious exits: north, east. HP: 80/100");
        t.update("You are attacked by a wolf! You feel thirsty.");
        t.record_command("kill wolf");
        let summary = t.state().summary();
        assert!(summary.contains("HP: 80/100"));
        assert!(summary.contains("Location: a clearing"));
        assert!(summary.contains("Exits: north, east"));
        assert!(summary.contains("In combat"));
        assert!(summary.contains("Effects: thirsty"));
        assert!(summary.contains("Last command: kill wolf"));
    }

    #[test]
    fn summary_flags_repeated_location() {
        let mut t = StateTracker::new();
        for _ in 0..3 {
            t.update("You are in a maze.");
        }
        assert!(t.state().summary().contains("seen 3 times in a row"));
    }
}
