//! Recognisers for the command shapes the kernel cares about.
//!
//! All matching is case-insensitive and whitespace tolerant.

use mudgate_types::Direction;

/// Direction of a bare (`n`, `north`) or `go`-prefixed (`go n`) movement.
pub fn movement_direction(command: &str) -> Option<Direction> {
    let lower = command.trim().to_ascii_lowercase();
    let target = match lower.strip_prefix("go ") {
        Some(rest) => rest.trim(),
        None => lower.as_str(),
    };
    Direction::from_token(target)
}

/// Direction of a `peer <dir>` request.
pub fn peer_direction(command: &str) -> Option<Direction> {
    let lower = command.trim().to_ascii_lowercase();
    lower
        .strip_prefix("peer ")
        .and_then(|rest| Direction::from_token(rest))
}

/// Direction touched by either a movement or a peer command.
pub fn explored_direction(command: &str) -> Option<Direction> {
    peer_direction(command).or_else(|| movement_direction(command))
}

/// `true` for look-type commands (`look`, `l`, `look at x`, `examine x`, ...).
pub fn is_look(command: &str) -> bool {
    let lower = command.trim().to_ascii_lowercase();
    let verb = lower.split_whitespace().next().unwrap_or("");
    matches!(verb, "look" | "l" | "examine" | "exa" | "glance")
}
