//! Ordered pattern tables used by the perception layer.
//!
//! Each category is a [`RuleTable`]: an ordered list of `(tag, pattern)`
//! rules evaluated by [`RuleTable::first_match`].  Keeping the categories as
//! data rather than inline `if` chains makes precedence explicit and lets
//! every table be tested on its own.
//!
//! | Table | Used for |
//! |---|---|
//! | [`SENSITIVE`] | stripped before any comparison (password leakage) |
//! | [`CRITICAL`] | always demands a response |
//! | [`NAVIGATION`] | movement / room transitions, demands a response |
//! | [`IGNORE`] | flavor text stripped from the diff |

use std::sync::LazyLock;

use regex::Regex;

// ─────────────────────────────────────────────────────────────────────────────
// RuleTable
// ─────────────────────────────────────────────────────────────────────────────

/// One named pattern inside a [`RuleTable`].
#[derive(Debug)]
pub struct PatternRule {
    pub tag: &'static str,
    regex: Regex,
}

/// An ordered table of `(tag, pattern)` rules.
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<PatternRule>,
}

impl RuleTable {
    /// Compile a table from `(tag, pattern)` pairs.
    ///
    /// # Errors
    ///
    /// Returns the first [`regex::Error`] encountered.
    pub fn new(specs: &[(&'static str, &str)]) -> Result<Self, regex::Error> {
        let rules = specs
            .iter()
            .map(|&(tag, pattern)| {
                Ok(PatternRule {
                    tag,
                    regex: Regex::new(pattern)?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Tag of the first rule (in table order) that matches `text`.
    pub fn first_match(&self, text: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(text))
            .map(|rule| rule.tag)
    }

    /// Remove every match of every rule from `text`, in table order.
    pub fn strip(&self, text: &str) -> String {
        self.rules.iter().fold(text.to_string(), |acc, rule| {
            rule.regex.replace_all(&acc, "").into_owned()
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile(specs: &[(&'static str, &str)]) -> RuleTable {
    RuleTable::new(specs).expect("built-in pattern table must compile")
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in tables
// ─────────────────────────────────────────────────────────────────────────────

/// Password-hint leakage; removed before the classifier looks at the text so
/// secrets are never echoed into downstream reasoning.
pub static SENSITIVE: LazyLock<RuleTable> = LazyLock::new(|| {
    compile(&[
        ("password_hint", r"(?im)^[^\n]*\bpassword hint\b[^\n]*$"),
        ("password_echo", r"(?im)^[^\n]*\byour password (?:is|was)\b[^\n]*$"),
    ])
});

/// Events that always warrant a decision, regardless of repetition.
pub static CRITICAL: LazyLock<RuleTable> = LazyLock::new(|| {
    compile(&[
        (
            "password_prompt",
            r"(?im)^[ \t]*(?:enter[ \t]+)?(?:your[ \t]+)?password[ \t]*[:?]?[ \t]*$",
        ),
        (
            "name_prompt",
            r"(?im)^[ \t]*(?:(?:enter[ \t]+)?(?:your[ \t]+)?(?:character[ \t]+)?name|what is your name)[ \t]*[:?]?[ \t]*$",
        ),
        (
            "combat",
            r"(?i)\b(?:attacks? you|you are attacked|hits? you|you hit|you attack|misses you|you miss|bites you|claws you)\b",
        ),
        ("death", r"(?i)\b(?:is dead|dies|you die|you have died|you killed)\b"),
        (
            "progress",
            r"(?i)\b(?:you feel more experienced|you gain|experience points?|your skill in|you have advanced|you advance|level up)\b",
        ),
        (
            "resource_denied",
            r"(?i)\b(?:door is closed|is locked|you don't have enough|you do not have enough|you can't afford|you are too tired)\b",
        ),
    ])
});

/// Movement confirmations, peer results, room entry/exit, blocked paths.
pub static NAVIGATION: LazyLock<RuleTable> = LazyLock::new(|| {
    compile(&[
        ("movement", r"(?i)\byou (?:go|move|walk|run|swim|climb|fly)\b"),
        ("peer", r"(?i)\byou peer\b"),
        ("room_entry", r"(?i)\byou are in\b"),
        ("arrival", r"(?i)\b(?:arrives|leaves)\b"),
        (
            "blocked",
            r"(?i)\b(?:you can't go that way|you cannot go that way|there is no exit|the way is blocked|blocks your way)\b",
        ),
    ])
});

/// Flavor text that never justifies a decision on its own.
pub static IGNORE: LazyLock<RuleTable> = LazyLock::new(|| {
    compile(&[
        (
            "weather",
            r"(?im)^[^\n]*\b(?:rain(?:s|ing)?|wind|breeze|clouds?|sun(?:light|shine)?|fog|snow(?:s|ing)?|thunder)\b[^\n]*$",
        ),
        ("ambient_sound", r"(?im)^[^\n]*\byou hear\b[^\n]*$"),
        ("exit_echo", r"(?im)^[^\n]*\b(?:obvious exits|you see exits|exits):[^\n]*$"),
        ("banner", r"(?im)^[ \t]*(?:welcome to\b[^\n]*|[*=-]{3,}[^\n]*)$"),
    ])
});

/// An exits declaration anywhere in the text.
pub static EXITS_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:obvious exits|you see exits|exits):").expect("exits regex must compile")
});

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[mGKHJ]").expect("ansi regex must compile")
});

/// Strip ANSI colour/cursor codes and carriage returns from server output.
pub fn clean_text(raw: &str) -> String {
    ANSI_ESCAPE.replace_all(raw, "").replace('\r', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_matches_exact_password_prompt_line() {
        assert_eq!(CRITICAL.first_match("Enter your password:"), Some("password_prompt"));
        assert_eq!(CRITICAL.first_match("Welcome back.\nPassword: "), Some("password_prompt"));
        // Mentioning a password mid-sentence is not a prompt.
        assert_eq!(CRITICAL.first_match("Never share your password with anyone."), None);
    }

    #[test]
    fn critical_matches_name_prompt() {
        assert_eq!(CRITICAL.first_match("What is your name?"), Some("name_prompt"));
        assert_eq!(CRITICAL.first_match("Enter your name:"), Some("name_prompt"));
    }

    #[test]
    fn critical_table_order_is_preserved() {
        // Both combat and death match; combat comes first in the table.
        let text = "The wolf attacks you! The rabbit is dead.";
        assert_eq!(CRITICAL.first_match(text), Some("combat"));
        assert_eq!(CRITICAL.first_match("The door is closed."), Some("resource_denied"));
    }

    #[test]
    fn navigation_matches_movement_and_blocked() {
        assert_eq!(NAVIGATION.first_match("You walk north."), Some("movement"));
        assert_eq!(NAVIGATION.first_match("You peer east and see a road."), Some("peer"));
        assert_eq!(NAVIGATION.first_match("You can't go that way."), Some("blocked"));
        assert_eq!(NAVIGATION.first_match("An orc arrives from the south."), Some("arrival"));
        assert_eq!(NAVIGATION.first_match("It is quiet."), None);
    }

    #[test]
    fn ignore_strips_flavor_lines_only() {
        let text = "A cold wind blows.\nA sword lies here.\nYou hear birds singing.";
        let stripped = IGNORE.strip(text);
        assert!(!stripped.contains("wind"));
        assert!(!stripped.contains("birds"));
        assert!(stripped.contains("A sword lies here."));
    }

    #[test]
    fn ignore_strips_exit_echo_and_banner() {
        let stripped = IGNORE.strip("Obvious exits: north, east\n*****\nWelcome to BatMUD");
        assert!(stripped.trim().is_empty(), "got {stripped:?}");
    }

    #[test]
    fn sensitive_strips_password_hint() {
        let stripped = SENSITIVE.strip("Password hint: it rhymes with cheese\nHello.");
        assert!(!stripped.contains("cheese"));
        assert!(stripped.contains("Hello."));
    }

    #[test]
    fn exits_declaration_detected() {
        assert!(EXITS_DECLARATION.is_match("Obvious exits: north"));
        assert!(EXITS_DECLARATION.is_match("you see exits: none"));
        assert!(!EXITS_DECLARATION.is_match("There is no way out."));
    }

    #[test]
    fn clean_text_strips_ansi_and_carriage_returns() {
        assert_eq!(clean_text("\x1b[1;32mHello\x1b[0m\r\nWorld"), "Hello\nWorld");
    }

    #[test]
    fn rule_table_reports_invalid_pattern() {
        assert!(RuleTable::new(&[("broken", "(unclosed")]).is_err());
        let table = RuleTable::new(&[("ok", "abc")]).unwrap();
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());
    }
}
