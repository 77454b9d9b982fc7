//! Effective-time source.
//!
//! A training session runs either on the real clock or on an
//! instructor-controlled simulated clock. Every scheduling decision takes
//! its "now" from this trait, so a frozen session classifies due/overdue
//! deterministically and tests inject arbitrary times.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Supplies the effective current time.
pub trait ClockSource: Send + Sync {
    /// Effective current time.
    fn now(&self) -> DateTime<Utc>;

    /// Whether the exposed time is simulated.
    fn is_simulating(&self) -> bool;
}

/// Real wall-clock time.
pub struct WallClock;

impl ClockSource for WallClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn is_simulating(&self) -> bool {
        false
    }
}

enum SimMode {
    /// Time stands still until the instructor moves it
    Frozen(DateTime<Utc>),
    /// Real time shifted by a fixed amount
    Offset(Duration),
}

/// Instructor-controlled simulated time.
///
/// Shared across all open workflows via `Arc`, so retiming the session
/// retimes every chart at once.
pub struct SimClock {
    mode: Mutex<SimMode>,
}

impl SimClock {
    /// Freeze the session at an absolute time.
    pub fn frozen(at: DateTime<Utc>) -> Self {
        Self {
            mode: Mutex::new(SimMode::Frozen(at)),
        }
    }

    /// Shift real time by a fixed offset.
    pub fn offset(offset: Duration) -> Self {
        Self {
            mode: Mutex::new(SimMode::Offset(offset)),
        }
    }

    /// Move the session to an absolute frozen time.
    pub fn set_time(&self, at: DateTime<Utc>) {
        *self.lock() = SimMode::Frozen(at);
    }

    /// Replace the offset from real time.
    pub fn set_offset(&self, offset: Duration) {
        *self.lock() = SimMode::Offset(offset);
    }

    /// Step the session forward.
    pub fn advance(&self, by: Duration) {
        let mut mode = self.lock();
        *mode = match *mode {
            SimMode::Frozen(at) => SimMode::Frozen(at + by),
            SimMode::Offset(offset) => SimMode::Offset(offset + by),
        };
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimMode> {
        // A poisoned mode still holds a usable timestamp
        self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ClockSource for SimClock {
    fn now(&self) -> DateTime<Utc> {
        match *self.lock() {
            SimMode::Frozen(at) => at,
            SimMode::Offset(offset) => Utc::now() + offset,
        }
    }

    fn is_simulating(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_frozen_clock_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let clock = SimClock::frozen(at);

        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), at);
        assert!(clock.is_simulating());
    }

    #[test]
    fn test_advance_frozen_clock() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let clock = SimClock::frozen(at);

        clock.advance(Duration::hours(6));
        assert_eq!(clock.now(), at + Duration::hours(6));
    }

    #[test]
    fn test_offset_clock_tracks_real_time() {
        let clock = SimClock::offset(Duration::hours(-2));
        let diff = Utc::now() - clock.now();

        assert!(diff >= Duration::minutes(119));
        assert!(diff <= Duration::minutes(121));
    }

    #[test]
    fn test_wall_clock_is_not_simulating() {
        assert!(!WallClock.is_simulating());
    }
}
