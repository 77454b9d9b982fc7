//! Administration event models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome status recorded on an administration event.
///
/// Historical records spell a given dose either `"administered"` or
/// `"success"`; both normalize to [`AdministrationStatus::Administered`] at
/// the ingestion boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdministrationStatus {
    /// Dose given
    #[serde(alias = "success")]
    Administered,
    /// Dose given after an operator override (early re-administration)
    Warning,
    /// Scan rejected (unknown medicine, not prescribed)
    Error,
    /// Safety precondition unmet; nothing given
    Blocked,
    /// Medication retrieved from storage, not yet given
    Collected,
}

impl AdministrationStatus {
    /// True when the record represents a dose actually given.
    pub fn counts_as_given(&self) -> bool {
        matches!(self, AdministrationStatus::Administered)
    }
}

impl fmt::Display for AdministrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AdministrationStatus::Administered => "administered",
            AdministrationStatus::Warning => "warning",
            AdministrationStatus::Error => "error",
            AdministrationStatus::Blocked => "blocked",
            AdministrationStatus::Collected => "collected",
        };
        f.write_str(s)
    }
}

/// Raised for a status spelling outside the known vocabulary.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown administration status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AdministrationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "administered" | "success" => Ok(AdministrationStatus::Administered),
            "warning" => Ok(AdministrationStatus::Warning),
            "error" => Ok(AdministrationStatus::Error),
            "blocked" => Ok(AdministrationStatus::Blocked),
            "collected" => Ok(AdministrationStatus::Collected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A single administration event. Append-only; the engine reads history and
/// emits new events but never mutates existing ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Administration {
    /// Unique event ID
    pub id: String,
    /// Patient the event belongs to
    pub patient_id: String,
    /// Medicine involved
    pub medicine_id: String,
    /// Prescription the event counts toward; legacy records may lack it
    pub prescription_id: Option<String>,
    /// Event status
    pub status: AdministrationStatus,
    /// Human-readable event message
    pub message: String,
    /// Event time from the effective clock
    pub administered_at: Option<DateTime<Utc>>,
    /// Staff member who performed the scan
    pub administered_by: String,
}

impl Administration {
    /// Create an event stamped with a fresh ID and the effective clock time.
    pub fn new_event(
        patient_id: String,
        medicine_id: String,
        prescription_id: Option<String>,
        status: AdministrationStatus,
        message: String,
        administered_by: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            medicine_id,
            prescription_id,
            status,
            message,
            administered_at: Some(at),
            administered_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_str_both_spellings() {
        assert_eq!(
            "administered".parse::<AdministrationStatus>().unwrap(),
            AdministrationStatus::Administered
        );
        assert_eq!(
            "success".parse::<AdministrationStatus>().unwrap(),
            AdministrationStatus::Administered
        );
        assert_eq!(
            "Success".parse::<AdministrationStatus>().unwrap(),
            AdministrationStatus::Administered
        );
        assert_eq!(
            "blocked".parse::<AdministrationStatus>().unwrap(),
            AdministrationStatus::Blocked
        );
    }

    #[test]
    fn test_status_from_str_unknown() {
        let err = "done".parse::<AdministrationStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("done".into()));
    }

    #[test]
    fn test_serde_alias_normalizes_success() {
        let status: AdministrationStatus = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(status, AdministrationStatus::Administered);

        let status: AdministrationStatus = serde_json::from_str("\"administered\"").unwrap();
        assert_eq!(status, AdministrationStatus::Administered);

        // Normalized form serializes to the canonical spelling
        assert_eq!(
            serde_json::to_string(&AdministrationStatus::Administered).unwrap(),
            "\"administered\""
        );
    }

    #[test]
    fn test_counts_as_given() {
        assert!(AdministrationStatus::Administered.counts_as_given());
        assert!(!AdministrationStatus::Warning.counts_as_given());
        assert!(!AdministrationStatus::Blocked.counts_as_given());
        assert!(!AdministrationStatus::Collected.counts_as_given());
        assert!(!AdministrationStatus::Error.counts_as_given());
    }
}
