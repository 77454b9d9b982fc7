//! Free-text parsers for the fixed vocabulary of frequency and duration
//! phrases used by the training content.
//!
//! Parsing never fails: an unrecognized phrase falls back to a safe default
//! and is flagged on the result (and logged) rather than raised.

mod duration;
mod periodicity;

pub use duration::*;
pub use periodicity::*;
