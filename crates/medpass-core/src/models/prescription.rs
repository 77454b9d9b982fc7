//! Prescription models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A prescriber's order for one medicine. Multiple prescriptions may exist
/// for the same patient and medicine over time (renewed orders); the engine
/// picks the active one deterministically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    /// Unique prescription ID
    pub id: String,
    /// Patient this order belongs to
    pub patient_id: String,
    /// Medicine being prescribed
    pub medicine_id: String,
    /// Dosage text (e.g. "500mg")
    pub dosage: String,
    /// Free-text frequency phrase (e.g. "Every 6 hours", "PRN")
    pub periodicity: String,
    /// Free-text course length (e.g. "3 days"); absent means open-ended
    pub duration: Option<String>,
    /// Route of administration
    pub route: String,
    /// Start of the order window
    pub start_date: Option<DateTime<Utc>>,
    /// End of the order window
    pub end_date: Option<DateTime<Utc>>,
    /// Precomputed dose total; authoritative when present
    pub total_doses: Option<u32>,
    /// Set permanently once the course is satisfied; never reverts
    pub completed: bool,
}

impl Prescription {
    /// Create a prescription with required fields and a fresh ID.
    pub fn new(patient_id: String, medicine_id: String, periodicity: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            medicine_id,
            dosage: String::new(),
            periodicity,
            duration: None,
            route: String::new(),
            start_date: None,
            end_date: None,
            total_doses: None,
            completed: false,
        }
    }

    /// Whether `now` falls inside the order's date window. An open-ended
    /// side always passes.
    pub fn is_window_active(&self, now: DateTime<Utc>) -> bool {
        let after_start = self.start_date.map_or(true, |start| now >= start);
        let before_end = self.end_date.map_or(true, |end| now <= end);
        after_start && before_end
    }
}
