//! Dosing frequency parser.
//!
//! Converts a free-text frequency phrase ("Every 6 hours", "q8h", "three
//! times daily", "PRN") into a canonical interval, an as-needed marker, or a
//! one-time marker. Matching is case-insensitive substring matching with a
//! fixed precedence; the first rule that matches wins.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical dosing frequency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Periodicity {
    /// One dose every `hours` hours
    FixedInterval { hours: u32 },
    /// As needed; no fixed next-dose time, never overdue
    Prn,
    /// A single administration completes the course
    OneTime,
}

/// Parse result. `fallback` marks a phrase outside the known vocabulary,
/// for which the conservative default interval was assumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedPeriodicity {
    pub periodicity: Periodicity,
    pub fallback: bool,
}

/// Interval assumed when a phrase cannot be parsed. Conservative: assuming
/// a more frequent schedule can only make a dose look due sooner.
pub const FALLBACK_INTERVAL_HOURS: u32 = 6;

/// Named daily frequencies, multi-word forms first so "three times daily"
/// can never be read as a bare "daily".
const DAILY_PHRASES: &[(&str, u32)] = &[
    ("four times daily", 6),
    ("qid", 6),
    ("three times daily", 8),
    ("tid", 8),
    ("twice daily", 12),
    ("bid", 12),
    ("once daily", 24),
];

/// Words implying a repeating cadence, which disqualify a one-time reading.
const CADENCE_WORDS: &[&str] = &["daily", "weekly", "monthly", "every", "per", "qd"];

fn q_hours_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"q\s*(\d+)\s*h(?:rs?)?").expect("static pattern"))
}

fn every_hours_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Optional "-<M>" range; the lower bound is the conservative reading
    RE.get_or_init(|| {
        Regex::new(r"every\s+(\d+)(?:\s*-\s*\d+)?\s*h(?:(?:ou)?rs?)?\b").expect("static pattern")
    })
}

/// Parse a frequency phrase.
pub fn parse_periodicity(text: &str) -> ParsedPeriodicity {
    let lower = text.trim().to_lowercase();

    let parsed = |periodicity| ParsedPeriodicity {
        periodicity,
        fallback: false,
    };

    if let Some(hours) = capture_hours(q_hours_re(), &lower) {
        return parsed(Periodicity::FixedInterval { hours });
    }

    if let Some(hours) = capture_hours(every_hours_re(), &lower) {
        return parsed(Periodicity::FixedInterval { hours });
    }

    for (phrase, hours) in DAILY_PHRASES {
        if lower.contains(phrase) {
            return parsed(Periodicity::FixedInterval { hours: *hours });
        }
    }
    if lower.contains("daily") && !lower.contains("times") {
        return parsed(Periodicity::FixedInterval { hours: 24 });
    }

    if lower.contains("as needed") || lower.contains("prn") {
        return parsed(Periodicity::Prn);
    }

    let one_time_start = lower.starts_with("once")
        || lower.starts_with("one-time")
        || lower.starts_with("one time")
        || lower.starts_with("single dose");
    if one_time_start && !CADENCE_WORDS.iter().any(|w| lower.contains(w)) {
        return parsed(Periodicity::OneTime);
    }

    tracing::warn!(phrase = %text, "unparsed periodicity, assuming q6h");
    ParsedPeriodicity {
        periodicity: Periodicity::FixedInterval {
            hours: FALLBACK_INTERVAL_HOURS,
        },
        fallback: true,
    }
}

fn capture_hours(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|h| *h > 0)
}
