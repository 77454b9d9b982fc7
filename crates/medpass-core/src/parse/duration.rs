//! Course duration parser.
//!
//! Converts a free-text duration phrase ("3 days", "2 weeks") into a whole
//! number of days, or an unbounded marker for open-ended and as-needed
//! courses.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prescribed course length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DurationSpec {
    /// Bounded course of `0..` days
    Days(u32),
    /// Open-ended or as-needed; the dose total is unknowable
    Unbounded,
}

/// Parse result. `fallback` marks a phrase outside the known vocabulary;
/// the course is then treated as unbounded, never as zero days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDuration {
    pub spec: DurationSpec,
    pub fallback: bool,
}

/// Months convert at a flat 30 days. An approximation, not calendar math.
pub const DAYS_PER_MONTH: u32 = 30;

fn days_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*day(?:s)?\b").expect("static pattern"))
}

fn weeks_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*week(?:s)?\b").expect("static pattern"))
}

fn months_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\s*month(?:s)?\b").expect("static pattern"))
}

/// Parse a duration phrase. `None` means the prescription carried no
/// duration at all, which is an open-ended course, not a parse failure.
pub fn parse_duration(text: Option<&str>) -> ParsedDuration {
    let unbounded = |fallback| ParsedDuration {
        spec: DurationSpec::Unbounded,
        fallback,
    };

    let Some(text) = text else {
        return unbounded(false);
    };
    let lower = text.trim().to_lowercase();

    if lower.is_empty() || lower.contains("as needed") || lower.contains("ongoing") {
        return unbounded(false);
    }

    if let Some(n) = capture_count(days_re(), &lower) {
        return ParsedDuration {
            spec: DurationSpec::Days(n),
            fallback: false,
        };
    }
    if let Some(n) = capture_count(weeks_re(), &lower) {
        return ParsedDuration {
            spec: DurationSpec::Days(n.saturating_mul(7)),
            fallback: false,
        };
    }
    if let Some(n) = capture_count(months_re(), &lower) {
        return ParsedDuration {
            spec: DurationSpec::Days(n.saturating_mul(DAYS_PER_MONTH)),
            fallback: false,
        };
    }

    tracing::warn!(phrase = %text, "unparsed duration, treating course as unbounded");
    unbounded(true)
}

fn capture_count(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}
