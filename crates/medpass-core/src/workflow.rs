//! Two-step administration workflow.
//!
//! Drives the patient-scan then medication-scan confirmation sequence. Each
//! scan is classified against the schedule and protocol checks into an
//! outcome, appends exactly one audit entry, and (for medication scans)
//! emits exactly one administration record to the persistence collaborator.
//! A patient mismatch logs but never persists.
//!
//! Safety-relevant checks fail closed (an unverifiable protocol dependency
//! blocks the dose); convenience checks fail open (an unreachable
//! assessment collaborator still gets the prompt).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::ClockSource;
use crate::models::{Administration, AdministrationStatus, Medicine, Prescription};
use crate::protocol::ProtocolGraph;
use crate::schedule;
use crate::EngineError;

/// Trailing window in which a `collected` record satisfies the collection
/// precondition.
pub const COLLECTION_VALIDITY_MINUTES: i64 = 60;

/// Trailing window in which an existing pain assessment suppresses a new
/// prompt.
pub const PAIN_ASSESSMENT_WINDOW_MINUTES: i64 = 30;

/// Collaborator failure at the persistence or assessment boundary.
#[derive(Debug, Error)]
#[error("collaborator call failed: {0}")]
pub struct PortError(pub String);

/// Receives the administration records the workflow decides to write.
pub trait AdministrationSink {
    fn append(&mut self, record: Administration) -> Result<(), PortError>;
}

/// Pain-assessment collaborator.
pub trait AssessmentPort {
    /// Whether a qualifying assessment exists at or after `since`.
    fn recent_pain_assessment(
        &self,
        patient_id: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, PortError>;

    /// Fire-and-forget prompt request.
    fn request_pain_assessment(&mut self, patient_id: &str, medicine_id: &str);
}

/// Read-only snapshot of one patient's chart, validated at construction.
#[derive(Debug)]
pub struct ChartContext<'a> {
    pub medicines: &'a [Medicine],
    pub prescriptions: &'a [Prescription],
    pub administrations: &'a [Administration],
    pub protocol: &'a ProtocolGraph,
}

impl<'a> ChartContext<'a> {
    /// Validate collaborator data. A record missing both its own id and its
    /// medicine id cannot be attributed to anything and is rejected before
    /// any workflow state can depend on it.
    pub fn new(
        medicines: &'a [Medicine],
        prescriptions: &'a [Prescription],
        administrations: &'a [Administration],
        protocol: &'a ProtocolGraph,
    ) -> Result<Self, EngineError> {
        for record in administrations {
            if record.id.is_empty() && record.medicine_id.is_empty() {
                return Err(EngineError::MalformedRecord(
                    "administration with neither id nor medicine id".into(),
                ));
            }
        }
        Ok(Self {
            medicines,
            prescriptions,
            administrations,
            protocol,
        })
    }

    fn medicine(&self, id: &str) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.id == id)
    }
}

/// Position in the two-step confirmation sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkflowStep {
    AwaitingPatient,
    AwaitingMedication,
    Complete,
}

/// Audit entry severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
    Error,
}

/// One line of the in-memory audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: String,
    pub text: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

/// Classification of one scan attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Dose administered; workflow complete
    Success { message: String },
    /// Dose not yet due; operator may confirm an early dose
    Warning { message: String },
    /// Safety precondition unmet; nothing administered
    Blocked { message: String },
    /// Scan rejected
    Error { message: String },
}

impl ScanOutcome {
    /// The outcome's operator-facing message.
    pub fn message(&self) -> &str {
        match self {
            ScanOutcome::Success { message }
            | ScanOutcome::Warning { message }
            | ScanOutcome::Blocked { message }
            | ScanOutcome::Error { message } => message,
        }
    }
}

/// An operator decision staged by a scan, awaiting explicit confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingConfirmation {
    /// Re-administration before the next dose is due
    EarlyDose {
        medicine_id: String,
        prescription_id: String,
    },
    /// Administration of a medicine not prescribed to this patient
    Unprescribed { medicine_id: String },
}

/// Per-patient workflow instance. One scan is fully classified before the
/// next is accepted; instances for different patients are independent.
pub struct AdministrationWorkflow {
    patient_id: String,
    operator: String,
    step: WorkflowStep,
    audit: Vec<AuditEntry>,
    pending: Option<PendingConfirmation>,
    clock: Arc<dyn ClockSource>,
}

impl AdministrationWorkflow {
    /// Start a workflow for one patient chart.
    pub fn new(
        patient_id: impl Into<String>,
        operator: impl Into<String>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            operator: operator.into(),
            step: WorkflowStep::AwaitingPatient,
            audit: Vec::new(),
            pending: None,
            clock,
        }
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    /// Full audit log, oldest first.
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit
    }

    pub fn last_entry(&self) -> Option<&AuditEntry> {
        self.audit.last()
    }

    /// The override staged by the last scan, if any.
    pub fn pending_confirmation(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    /// Discard a staged override without acting on it.
    pub fn dismiss_pending(&mut self) {
        self.pending = None;
    }

    /// Operator-initiated return to the start of the sequence.
    pub fn reset(&mut self) {
        self.step = WorkflowStep::AwaitingPatient;
        self.pending = None;
        self.log(Severity::Info, "Workflow reset; awaiting patient scan".into());
    }

    /// First step: confirm patient identity. A mismatch is never itself an
    /// administration event, so nothing is persisted either way.
    pub fn scan_patient(&mut self, scanned_id: &str) -> ScanOutcome {
        if self.step != WorkflowStep::AwaitingPatient {
            let message = "Not awaiting a patient scan".to_string();
            self.log(Severity::Error, message.clone());
            return ScanOutcome::Error { message };
        }

        if scanned_id == self.patient_id {
            self.step = WorkflowStep::AwaitingMedication;
            let message = "Patient identity confirmed".to_string();
            self.log(Severity::Success, message.clone());
            tracing::debug!(patient = %self.patient_id, "patient scan confirmed");
            ScanOutcome::Success { message }
        } else {
            let message = "Scanned wristband does not match this patient".to_string();
            self.log(Severity::Error, message.clone());
            ScanOutcome::Error { message }
        }
    }

    /// Second step: classify a medication scan.
    pub fn scan_medication(
        &mut self,
        scanned_id: &str,
        chart: &ChartContext<'_>,
        sink: &mut dyn AdministrationSink,
        assessments: &mut dyn AssessmentPort,
    ) -> ScanOutcome {
        if self.step != WorkflowStep::AwaitingMedication {
            let message = "Not awaiting a medication scan".to_string();
            self.log(Severity::Error, message.clone());
            return ScanOutcome::Error { message };
        }
        // A new scan supersedes any staged override
        self.pending = None;
        let now = self.clock.now();

        // Unknown medicine: reject, stay on this step
        let Some(medicine) = chart.medicine(scanned_id) else {
            let message = format!("Scanned item {} is not a known medicine", scanned_id);
            self.log(Severity::Error, message.clone());
            self.persist(
                sink,
                self.record(scanned_id, None, AdministrationStatus::Error, &message, now),
            );
            return ScanOutcome::Error { message };
        };

        // Not prescribed: reject, but stage the operator override path
        let Some(prescription) =
            schedule::resolve_active_prescription(chart.prescriptions, scanned_id, now)
        else {
            let message = format!("{} is not prescribed for this patient", medicine.name);
            self.log(Severity::Error, message.clone());
            self.persist(
                sink,
                self.record(scanned_id, None, AdministrationStatus::Error, &message, now),
            );
            self.pending = Some(PendingConfirmation::Unprescribed {
                medicine_id: scanned_id.to_string(),
            });
            return ScanOutcome::Error { message };
        };

        // Protocol gate, fail-closed
        let gate = chart
            .protocol
            .can_collect(scanned_id, chart.administrations, now);
        if let Some(reason) = gate.block_reason() {
            let message = format!("{}: {}", medicine.name, reason);
            self.log(Severity::Warning, message.clone());
            self.persist(
                sink,
                self.record(
                    scanned_id,
                    Some(&prescription.id),
                    AdministrationStatus::Blocked,
                    &message,
                    now,
                ),
            );
            return ScanOutcome::Blocked { message };
        }

        // Protocol medicines must have been collected within the last hour
        if chart.protocol.is_follow_up(scanned_id)
            && !recently_collected(chart.administrations, scanned_id, now)
        {
            let message = format!("{}: collection not completed", medicine.name);
            self.log(Severity::Warning, message.clone());
            self.persist(
                sink,
                self.record(
                    scanned_id,
                    Some(&prescription.id),
                    AdministrationStatus::Blocked,
                    &message,
                    now,
                ),
            );
            return ScanOutcome::Blocked { message };
        }

        let last = schedule::last_administered_at(prescription, chart.administrations);
        let periodicity = crate::parse::parse_periodicity(&prescription.periodicity).periodicity;

        if last.is_none() {
            let message = format!("{} administered", medicine.name);
            return self.administer(medicine, prescription, chart, sink, assessments, message, now);
        }

        if schedule::is_dose_due(last, periodicity, now) {
            let message = format!("{}: next scheduled dose administered", medicine.name);
            return self.administer(medicine, prescription, chart, sink, assessments, message, now);
        }

        // Already given and not yet due: warn and stage the override
        let message = format!("{} was already administered and is not yet due", medicine.name);
        self.log(Severity::Warning, message.clone());
        self.persist(
            sink,
            self.record(
                scanned_id,
                Some(&prescription.id),
                AdministrationStatus::Warning,
                &message,
                now,
            ),
        );
        self.pending = Some(PendingConfirmation::EarlyDose {
            medicine_id: scanned_id.to_string(),
            prescription_id: prescription.id.clone(),
        });
        ScanOutcome::Warning { message }
    }

    /// Act on the override staged by the previous scan. This is the explicit
    /// confirmation step; without it no overridden dose is ever recorded.
    pub fn confirm_pending(
        &mut self,
        chart: &ChartContext<'_>,
        sink: &mut dyn AdministrationSink,
        assessments: &mut dyn AssessmentPort,
    ) -> ScanOutcome {
        let Some(pending) = self.pending.take() else {
            let message = "No override awaiting confirmation".to_string();
            self.log(Severity::Error, message.clone());
            return ScanOutcome::Error { message };
        };
        let now = self.clock.now();

        match pending {
            PendingConfirmation::EarlyDose {
                medicine_id,
                prescription_id,
            } => {
                let name = chart
                    .medicine(&medicine_id)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| medicine_id.clone());
                let message = format!("{}: early dose given on operator confirmation", name);
                self.log(Severity::Warning, message.clone());
                self.persist(
                    sink,
                    self.record(
                        &medicine_id,
                        Some(&prescription_id),
                        AdministrationStatus::Administered,
                        &message,
                        now,
                    ),
                );
                self.prompt_pain_assessment(chart, assessments, &medicine_id, now);
                self.step = WorkflowStep::Complete;
                ScanOutcome::Success { message }
            }
            PendingConfirmation::Unprescribed { medicine_id } => {
                let name = chart
                    .medicine(&medicine_id)
                    .map(|m| m.name.clone())
                    .unwrap_or_else(|| medicine_id.clone());
                let message = format!(
                    "{}: administered without prescription on operator override",
                    name
                );
                self.log(Severity::Danger, message.clone());
                self.persist(
                    sink,
                    self.record(
                        &medicine_id,
                        None,
                        AdministrationStatus::Administered,
                        &message,
                        now,
                    ),
                );
                self.prompt_pain_assessment(chart, assessments, &medicine_id, now);
                self.step = WorkflowStep::Complete;
                ScanOutcome::Success { message }
            }
        }
    }

    fn administer(
        &mut self,
        medicine: &Medicine,
        prescription: &Prescription,
        chart: &ChartContext<'_>,
        sink: &mut dyn AdministrationSink,
        assessments: &mut dyn AssessmentPort,
        message: String,
        now: DateTime<Utc>,
    ) -> ScanOutcome {
        self.log(Severity::Success, message.clone());
        self.persist(
            sink,
            self.record(
                &medicine.id,
                Some(&prescription.id),
                AdministrationStatus::Administered,
                &message,
                now,
            ),
        );
        self.prompt_pain_assessment(chart, assessments, &medicine.id, now);
        self.step = WorkflowStep::Complete;
        tracing::debug!(patient = %self.patient_id, medicine = %medicine.id, "dose administered");
        ScanOutcome::Success { message }
    }

    /// Pain-relief side effect. Suppressed by a recent assessment; a failed
    /// lookup still shows the prompt. Never blocks completion.
    fn prompt_pain_assessment(
        &mut self,
        chart: &ChartContext<'_>,
        assessments: &mut dyn AssessmentPort,
        medicine_id: &str,
        now: DateTime<Utc>,
    ) {
        let Some(medicine) = chart.medicine(medicine_id) else {
            return;
        };
        if !medicine.is_pain_relief() {
            return;
        }
        let since = now - Duration::minutes(PAIN_ASSESSMENT_WINDOW_MINUTES);
        let recent = assessments
            .recent_pain_assessment(&self.patient_id, since)
            .unwrap_or(false);
        if !recent {
            assessments.request_pain_assessment(&self.patient_id, medicine_id);
        }
    }

    fn record(
        &self,
        medicine_id: &str,
        prescription_id: Option<&str>,
        status: AdministrationStatus,
        message: &str,
        now: DateTime<Utc>,
    ) -> Administration {
        Administration::new_event(
            self.patient_id.clone(),
            medicine_id.to_string(),
            prescription_id.map(String::from),
            status,
            message.to_string(),
            self.operator.clone(),
            now,
        )
    }

    /// Persist a decided record. A failed write is audited and logged, and
    /// the already-decided classification stands.
    fn persist(&mut self, sink: &mut dyn AdministrationSink, record: Administration) {
        if let Err(e) = sink.append(record) {
            tracing::error!(error = %e, "failed to persist administration record");
            self.log(
                Severity::Error,
                format!("Administration record could not be saved: {}", e),
            );
        }
    }

    fn log(&mut self, severity: Severity, text: String) {
        self.audit.push(AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            text,
            severity,
            timestamp: self.clock.now(),
        });
    }
}

/// Whether a `collected` record for the medicine exists within the trailing
/// validity window.
fn recently_collected(administrations: &[Administration], medicine_id: &str, now: DateTime<Utc>) -> bool {
    let cutoff = now - Duration::minutes(COLLECTION_VALIDITY_MINUTES);
    administrations.iter().any(|a| {
        a.medicine_id == medicine_id
            && a.status == AdministrationStatus::Collected
            && a.administered_at.is_some_and(|t| t >= cutoff && t <= now)
    })
}
