use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A compass or vertical direction as understood by MUD movement commands.
///
/// Variants are declared in canonical order; sets of directions iterate in
/// this order, which keeps "pick any known exit" deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 10] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::Northeast,
        Direction::Northwest,
        Direction::Southeast,
        Direction::Southwest,
        Direction::Up,
        Direction::Down,
    ];

    /// Parse a full name (`northeast`) or abbreviation (`ne`, `n`, `u`).
    /// Matching is case-insensitive; surrounding whitespace is ignored.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.full_name() == token || d.short() == token)
    }

    /// The long form used in exit lines, e.g. `"northeast"`.
    pub fn full_name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::Northeast => "northeast",
            Direction::Northwest => "northwest",
            Direction::Southeast => "southeast",
            Direction::Southwest => "southwest",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// The abbreviated movement command, e.g. `"ne"`.
    pub fn short(self) -> &'static str {
        match self {
            Direction::North => "n",
            Direction::South => "s",
            Direction::East => "e",
            Direction::West => "w",
            Direction::Northeast => "ne",
            Direction::Northwest => "nw",
            Direction::Southeast => "se",
            Direction::Southwest => "sw",
            Direction::Up => "u",
            Direction::Down => "d",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_name())
    }
}

/// Unified event wrapper for the session event queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "mudgate-runtime::session"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp `payload` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data delivered to presentation sinks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Raw server text, ANSI codes intact, for display.
    GameText(String),
    /// A command the oracle proposed and that was dispatched.
    Decision(String),
    /// The validator replaced or suppressed a proposed command.
    Override {
        original: String,
        replacement: Option<String>,
        reason: String,
    },
    /// Autonomous play was paused (`true`) or resumed (`false`).
    ModeToggle { paused: bool },
    /// Informational notice: retries exhausted, manual command sent, etc.
    Notice(String),
    /// A fault worth showing the operator. Fatal only for transport loss.
    Fault(String),
}

/// Global error type spanning transport loss, oracle failures, and setup problems.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum MudError {
    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Oracle Error: {0}")]
    Oracle(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Event Channel Error: {0}")]
    Channel(String),
}
