use std::fmt;

use colored::{ColoredString, Colorize};
use serde::Serialize;

/// Display-only banding of a days-remaining metric. Cutoffs are unrelated to
/// the inactivity thresholds used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub const HIGH_MAX_DAYS: i64 = 30;
    pub const MEDIUM_MAX_DAYS: i64 = 90;

    /// Already past (negative) or within 30 days is High, up to 90 is
    /// Medium, anything further out is Low.
    pub fn from_days_remaining(days: i64) -> Self {
        if days <= Self::HIGH_MAX_DAYS {
            Severity::High
        } else if days <= Self::MEDIUM_MAX_DAYS {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn paint(self, text: &str) -> ColoredString {
        match self {
            Severity::High => text.red().bold(),
            Severity::Medium => text.yellow(),
            Severity::Low => text.green(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => f.write_str("High"),
            Severity::Medium => f.write_str("Medium"),
            Severity::Low => f.write_str("Low"),
        }
    }
}
