//! Medpass Core Library
//!
//! Decision engine for simulated hospital medication administration. Given
//! one patient's prescriptions, administration history, protocol links and
//! the session clock, it decides when each medicine is due, how many doses
//! remain, whether a protocol follow-up may be collected, and classifies
//! each scan in the two-step administration workflow.
//!
//! # Architecture
//!
//! ```text
//! ClockSource ──┐
//!               │
//! Prescription ─┤→ PeriodicityParser ─┐
//! records       │→ DurationParser ────┤→ DoseScheduleCalculator ─┐
//!               │                     │                          │
//! Administration│→ ProtocolGraph ─────┴──────────────────────────┤
//! history       │                                                ▼
//!               └────────────────────────────→ AdministrationWorkflow
//!                                                    │
//!                                       outcome + audit entry + record
//!                                            (caller persists)
//! ```
//!
//! # Core Principle
//!
//! **Safety checks fail closed, convenience checks fail open.** An
//! unverifiable protocol dependency blocks the dose; an unreachable
//! assessment collaborator still gets the pain-assessment prompt. The
//! engine persists nothing itself: every decided record is handed to the
//! caller through the sink port.
//!
//! # Modules
//!
//! - [`clock`]: effective-time source (wall clock or simulated session time)
//! - [`models`]: domain types (Medicine, Prescription, Administration, MedicationLink)
//! - [`parse`]: frequency and duration phrase parsers
//! - [`schedule`]: dose totals, remaining counts, due/overdue classification
//! - [`protocol`]: trigger-to-follow-up links and collection windows
//! - [`workflow`]: the two-step scan state machine

pub mod clock;
pub mod models;
pub mod parse;
pub mod protocol;
pub mod schedule;
pub mod workflow;

// Re-export commonly used types
pub use clock::{ClockSource, SimClock, WallClock};
pub use models::{
    Administration, AdministrationStatus, MedicationLink, Medicine, Prescription, UnknownStatus,
};
pub use parse::{
    parse_duration, parse_periodicity, DurationSpec, ParsedDuration, ParsedPeriodicity,
    Periodicity,
};
pub use protocol::{
    collection_window, format_time_remaining, CollectionDecision, CollectionWindow, DelayInfo,
    ProtocolGraph,
};
pub use schedule::{
    classify_status, is_complete, is_dose_due, remaining_doses, resolve_active_prescription,
    total_doses, MedicationStatus, RemainingDoses,
};
pub use workflow::{
    AdministrationSink, AdministrationWorkflow, AssessmentPort, AuditEntry, ChartContext,
    PendingConfirmation, PortError, ScanOutcome, Severity, WorkflowStep,
};

use thiserror::Error;

// =========================================================================
// Engine Error Type
// =========================================================================

/// Raised only for truly malformed collaborator data. Expected, user-facing
/// conditions (unknown scans, protocol blocks, parse fallbacks) are typed
/// outcomes, not errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed administration record: {0}")]
    MalformedRecord(String),

    #[error(transparent)]
    UnknownStatus(#[from] models::UnknownStatus),
}
