//! [`ChangeClassifier`] – decides whether fresh server text deserves a decision.
//!
//! The classifier is stateless: it only ever looks at the newest text snapshot
//! and the one before it.  Evaluation order is fixed:
//!
//! 1. empty or identical input → no new information;
//! 2. [`SENSITIVE`] patterns are stripped from both snapshots;
//! 3. any [`CRITICAL`] match → respond;
//! 4. any [`NAVIGATION`] match → respond;
//! 5. otherwise the previous snapshot is subtracted from the new one (plain
//!    substring removal, not a structural diff), [`IGNORE`] patterns are
//!    stripped from the remainder, and the classifier responds if anything is
//!    left, or if the unstripped remainder declared exits.
//!
//! Reordering these steps changes which events the ignore table can starve.
//!
//! The substring subtraction assumes the transport delivers text in order; if
//! buffered chunks are ever interleaved the subtraction stops lining up.

use crate::patterns::{CRITICAL, EXITS_DECLARATION, IGNORE, NAVIGATION, SENSITIVE};

/// Why the classifier reached its decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing worth a decision.
    NoNewInfo,
    /// A critical pattern matched; the tag names which one.
    Critical(&'static str),
    /// A navigation pattern matched.
    Navigation(&'static str),
    /// Only flavor text changed, but it carried an exits declaration.
    NewExits,
    /// Non-flavor content remained after subtraction.
    NewContent,
}

impl Verdict {
    pub fn should_respond(self) -> bool {
        !matches!(self, Verdict::NoNewInfo)
    }
}

/// Stateless significance gate over two consecutive text snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChangeClassifier;

impl ChangeClassifier {
    pub fn new() -> Self {
        Self
    }

    /// `true` when `new_text` warrants asking the oracle for a decision.
    pub fn should_respond(&self, new_text: &str, last_text: &str) -> bool {
        self.classify(new_text, last_text).should_respond()
    }

    /// Full decision including the reason.
    pub fn classify(&self, new_text: &str, last_text: &str) -> Verdict {
        if new_text.trim().is_empty() || new_text == last_text {
            return Verdict::NoNewInfo;
        }

        let new_clean = SENSITIVE.strip(new_text);
        if new_clean.trim().is_empty() {
            return Verdict::NoNewInfo;
        }
        let last_clean = SENSITIVE.strip(last_text);

        if let Some(tag) = CRITICAL.first_match(&new_clean) {
            return Verdict::Critical(tag);
        }
        if let Some(tag) = NAVIGATION.first_match(&new_clean) {
            return Verdict::Navigation(tag);
        }

        let diff = if last_clean.is_empty() {
            new_clean
        } else {
            new_clean.replace(&last_clean, "")
        };
        let remainder = IGNORE.strip(&diff);
        if remainder.trim().is_empty() {
            if EXITS_DECLARATION.is_match(&diff) {
                Verdict::NewExits
            } else {
                Verdict::NoNewInfo
            }
        } else {
            Verdict::NewContent
        }
    }
}
