//! Protocol link models.

use serde::{Deserialize, Serialize};

/// A directed trigger-to-follow-up dependency between two medicines.
///
/// The follow-up medicine may only be collected once the trigger medicine
/// has been administered and the delay has (nearly) elapsed. Static
/// configuration; read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicationLink {
    /// Unique link ID
    pub id: String,
    /// Medicine whose administration starts the clock
    pub trigger_medicine_id: String,
    /// Medicine gated behind the trigger
    pub follow_medicine_id: String,
    /// Minutes between trigger administration and the follow-up's due time
    pub delay_minutes: i64,
    /// Frequency phrase for the follow-up course
    pub follow_frequency: String,
    /// Length of the follow-up course in hours
    pub follow_duration_hours: u32,
    /// Dose text overriding the follow-up medicine's default
    pub dose_override: Option<String>,
}

impl MedicationLink {
    /// Create a link with required fields and a fresh ID.
    pub fn new(trigger_medicine_id: String, follow_medicine_id: String, delay_minutes: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            trigger_medicine_id,
            follow_medicine_id,
            delay_minutes,
            follow_frequency: String::new(),
            follow_duration_hours: 0,
            dose_override: None,
        }
    }
}
