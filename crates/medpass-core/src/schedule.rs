//! Dose schedule calculations.
//!
//! Combines a parsed frequency and course duration into dose totals, counts
//! doses already given, decides when the next dose is due, and classifies a
//! prescription's current state for the chart.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Administration, Prescription};
use crate::parse::{parse_duration, parse_periodicity, DurationSpec, Periodicity};
use crate::protocol::ProtocolGraph;

/// Reset interval after which an as-needed dose may be given again.
pub const PRN_RESET_INTERVAL_HOURS: i64 = 6;

/// Total doses a schedule calls for, when knowable.
///
/// Fixed intervals contribute `floor(24 / hours)` doses per day, at least
/// one. Floor, never ceiling: an over-counted total can hide a finished
/// course as incomplete.
pub fn total_doses(periodicity: Periodicity, duration: DurationSpec) -> Option<u32> {
    match (periodicity, duration) {
        (Periodicity::Prn, _) => None,
        (_, DurationSpec::Unbounded) => None,
        (Periodicity::OneTime, DurationSpec::Days(_)) => Some(1),
        (Periodicity::FixedInterval { hours }, DurationSpec::Days(days)) => {
            let per_day = (24 / hours.max(1)).max(1);
            Some(days.saturating_mul(per_day))
        }
    }
}

/// Dose total for a prescription: the precomputed field when present, else
/// derived from its frequency and duration phrases. `None` when the total
/// is unknowable (PRN, open-ended, or an unparseable frequency).
pub fn prescription_total(prescription: &Prescription) -> Option<u32> {
    if let Some(total) = prescription.total_doses {
        return Some(total);
    }
    let periodicity = parse_periodicity(&prescription.periodicity);
    if periodicity.fallback {
        return None;
    }
    let duration = parse_duration(prescription.duration.as_deref());
    total_doses(periodicity.periodicity, duration.spec)
}

/// Administrations that count toward a prescription's dose total.
///
/// Exact prescription-id matches are authoritative; only when none exist do
/// legacy records with no prescription id, for the same patient and
/// medicine, count instead. The two sets are never mixed.
pub fn qualifying_administrations<'a>(
    prescription: &Prescription,
    administrations: &'a [Administration],
) -> Vec<&'a Administration> {
    let exact: Vec<&Administration> = administrations
        .iter()
        .filter(|a| a.status.counts_as_given())
        .filter(|a| a.prescription_id.as_deref() == Some(prescription.id.as_str()))
        .collect();
    if !exact.is_empty() {
        return exact;
    }
    administrations
        .iter()
        .filter(|a| a.status.counts_as_given())
        .filter(|a| a.prescription_id.is_none())
        .filter(|a| {
            a.patient_id == prescription.patient_id && a.medicine_id == prescription.medicine_id
        })
        .collect()
}

/// Count of doses given against a prescription.
pub fn administered_count(prescription: &Prescription, administrations: &[Administration]) -> usize {
    qualifying_administrations(prescription, administrations).len()
}

/// Time of the most recent dose given against a prescription.
pub fn last_administered_at(
    prescription: &Prescription,
    administrations: &[Administration],
) -> Option<DateTime<Utc>> {
    qualifying_administrations(prescription, administrations)
        .iter()
        .filter_map(|a| a.administered_at)
        .max()
}

/// Doses remaining on a prescription, as shown on the chart.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RemainingDoses {
    /// As-needed; no countable total
    Prn,
    /// Total unknowable (open-ended or unparseable order)
    Unknown,
    /// Doses left, clamped to `[0, total]`
    Count(u32),
}

impl fmt::Display for RemainingDoses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemainingDoses::Prn => f.write_str("PRN"),
            RemainingDoses::Unknown => f.write_str("Unknown"),
            RemainingDoses::Count(n) => write!(f, "Doses Left: {}", n),
        }
    }
}

/// Doses remaining on a prescription.
pub fn remaining_doses(
    prescription: &Prescription,
    administrations: &[Administration],
) -> RemainingDoses {
    if parse_periodicity(&prescription.periodicity).periodicity == Periodicity::Prn {
        return RemainingDoses::Prn;
    }
    let Some(total) = prescription_total(prescription) else {
        return RemainingDoses::Unknown;
    };
    let given = administered_count(prescription, administrations) as u32;
    RemainingDoses::Count(total.saturating_sub(given))
}

/// Whether a prescription's course is satisfied.
///
/// Pure and idempotent. The `completed` flag is monotonic: once a caller
/// persists it, this returns true regardless of later history changes.
pub fn is_complete(prescription: &Prescription, administrations: &[Administration]) -> bool {
    if prescription.completed {
        return true;
    }
    match parse_periodicity(&prescription.periodicity).periodicity {
        Periodicity::Prn => false,
        Periodicity::OneTime => {
            !qualifying_administrations(prescription, administrations).is_empty()
        }
        Periodicity::FixedInterval { .. } => match prescription_total(prescription) {
            Some(total) => administered_count(prescription, administrations) >= total as usize,
            None => false,
        },
    }
}

/// Whether the next dose is due at `now`.
///
/// A schedule with no prior dose is always due. PRN uses the same interval
/// test with the configured reset interval; callers must present an elapsed
/// PRN interval as "due again", never as overdue. A one-time order is never
/// due again after its single administration.
pub fn is_dose_due(
    last_administered_at: Option<DateTime<Utc>>,
    periodicity: Periodicity,
    now: DateTime<Utc>,
) -> bool {
    match periodicity {
        Periodicity::OneTime => last_administered_at.is_none(),
        Periodicity::FixedInterval { hours } => {
            interval_elapsed(last_administered_at, hours as i64, now)
        }
        Periodicity::Prn => interval_elapsed(last_administered_at, PRN_RESET_INTERVAL_HOURS, now),
    }
}

fn interval_elapsed(last: Option<DateTime<Utc>>, hours: i64, now: DateTime<Utc>) -> bool {
    match last {
        None => true,
        Some(given_at) => now >= given_at + Duration::hours(hours),
    }
}

/// Chart status of a prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MedicationStatus {
    /// Course satisfied
    Complete,
    /// Given, not yet due again
    Administered,
    /// A fixed-interval dose is past due
    Overdue,
    /// Protocol or collection precondition unmet
    Blocked { reason: String },
    /// Ready to give: never given, or a PRN interval has reset
    Due,
}

impl MedicationStatus {
    /// Chart badge label.
    pub fn label(&self) -> &'static str {
        match self {
            MedicationStatus::Complete => "Complete",
            MedicationStatus::Administered => "Administered",
            MedicationStatus::Overdue => "Overdue",
            MedicationStatus::Blocked { .. } => "Blocked",
            MedicationStatus::Due => "Due",
        }
    }
}

/// Classify a prescription's current state for the chart.
pub fn classify_status(
    prescription: &Prescription,
    administrations: &[Administration],
    protocol: &ProtocolGraph,
    now: DateTime<Utc>,
) -> MedicationStatus {
    if is_complete(prescription, administrations) {
        return MedicationStatus::Complete;
    }

    let gate = protocol.can_collect(&prescription.medicine_id, administrations, now);
    if let Some(reason) = gate.block_reason() {
        return MedicationStatus::Blocked { reason };
    }

    let periodicity = parse_periodicity(&prescription.periodicity).periodicity;
    let last = last_administered_at(prescription, administrations);

    match periodicity {
        Periodicity::OneTime => MedicationStatus::Due,
        Periodicity::Prn => {
            if is_dose_due(last, periodicity, now) {
                MedicationStatus::Due
            } else {
                MedicationStatus::Administered
            }
        }
        Periodicity::FixedInterval { .. } => match last {
            None => MedicationStatus::Due,
            Some(_) => {
                if is_dose_due(last, periodicity, now) {
                    MedicationStatus::Overdue
                } else {
                    MedicationStatus::Administered
                }
            }
        },
    }
}

/// Pick the single authoritative prescription among possibly several for the
/// same medicine.
///
/// Prescriptions whose date window contains `now` win; among those (or all,
/// when none is active) the most recent start date wins, with absent dates
/// sorting last; remaining ties break on the lexicographically greatest id.
/// The choice never depends on input order.
pub fn resolve_active_prescription<'a>(
    prescriptions: &'a [Prescription],
    medicine_id: &str,
    now: DateTime<Utc>,
) -> Option<&'a Prescription> {
    let candidates: Vec<&Prescription> = prescriptions
        .iter()
        .filter(|p| p.medicine_id == medicine_id)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let active: Vec<&Prescription> = candidates
        .iter()
        .copied()
        .filter(|p| p.is_window_active(now))
        .collect();
    let pool = if active.is_empty() { candidates } else { active };

    pool.into_iter().max_by(|a, b| {
        a.start_date
            .cmp(&b.start_date)
            .then_with(|| a.id.cmp(&b.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdministrationStatus;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, minute, 0).unwrap()
    }

    fn rx(periodicity: &str, duration: Option<&str>) -> Prescription {
        let mut rx = Prescription::new("p1".into(), "10000001".into(), periodicity.into());
        rx.duration = duration.map(String::from);
        rx
    }

    fn dose(rx: &Prescription, when: DateTime<Utc>) -> Administration {
        Administration::new_event(
            rx.patient_id.clone(),
            rx.medicine_id.clone(),
            Some(rx.id.clone()),
            AdministrationStatus::Administered,
            "administered".into(),
            "nurse-1".into(),
            when,
        )
    }

    fn legacy_dose(patient_id: &str, medicine_id: &str, when: DateTime<Utc>) -> Administration {
        Administration::new_event(
            patient_id.into(),
            medicine_id.into(),
            None,
            AdministrationStatus::Administered,
            "administered".into(),
            "nurse-1".into(),
            when,
        )
    }

    #[test]
    fn test_total_doses() {
        let q6h = Periodicity::FixedInterval { hours: 6 };
        assert_eq!(total_doses(q6h, DurationSpec::Days(3)), Some(12));
        assert_eq!(total_doses(q6h, DurationSpec::Unbounded), None);
        assert_eq!(total_doses(Periodicity::Prn, DurationSpec::Days(3)), None);
        assert_eq!(
            total_doses(Periodicity::OneTime, DurationSpec::Days(3)),
            Some(1)
        );
    }

    #[test]
    fn test_total_doses_floors_partial_intervals() {
        // 24 / 7 = 3.43 doses per day: floor to 3, never round up
        let q7h = Periodicity::FixedInterval { hours: 7 };
        assert_eq!(total_doses(q7h, DurationSpec::Days(2)), Some(6));

        // Intervals over a day still contribute one dose per day
        let q36h = Periodicity::FixedInterval { hours: 36 };
        assert_eq!(total_doses(q36h, DurationSpec::Days(3)), Some(3));
    }

    #[test]
    fn test_prescription_total_prefers_precomputed() {
        let mut p = rx("Every 6 hours", Some("3 days"));
        assert_eq!(prescription_total(&p), Some(12));

        p.total_doses = Some(10);
        assert_eq!(prescription_total(&p), Some(10));
    }

    #[test]
    fn test_prescription_total_unknown_for_unparseable_frequency() {
        let p = rx("with meals", Some("3 days"));
        assert_eq!(prescription_total(&p), None);
        assert_eq!(remaining_doses(&p, &[]), RemainingDoses::Unknown);
    }

    #[test]
    fn test_counting_prefers_prescription_id_matches() {
        let p = rx("Every 6 hours", Some("3 days"));
        let history = vec![
            dose(&p, at(1, 8, 0)),
            // Legacy record for the same patient+medicine must not add on
            legacy_dose("p1", "10000001", at(1, 2, 0)),
            // Another patient's record never counts
            legacy_dose("p2", "10000001", at(1, 8, 0)),
        ];
        assert_eq!(administered_count(&p, &history), 1);
    }

    #[test]
    fn test_counting_falls_back_to_legacy_records() {
        let p = rx("Every 6 hours", Some("3 days"));
        let history = vec![
            legacy_dose("p1", "10000001", at(1, 2, 0)),
            legacy_dose("p1", "10000001", at(1, 8, 0)),
            legacy_dose("p1", "10000099", at(1, 8, 0)),
        ];
        assert_eq!(administered_count(&p, &history), 2);
        assert_eq!(last_administered_at(&p, &history), Some(at(1, 8, 0)));
    }

    #[test]
    fn test_remaining_doses_clamped_and_labelled() {
        let p = rx("Every 6 hours", Some("3 days"));
        assert_eq!(remaining_doses(&p, &[]), RemainingDoses::Count(12));

        let history: Vec<Administration> = (0..14).map(|h| dose(&p, at(1, 0, h))).collect();
        let remaining = remaining_doses(&p, &history);
        assert_eq!(remaining, RemainingDoses::Count(0));
        assert_eq!(remaining.to_string(), "Doses Left: 0");

        let prn = rx("PRN", None);
        assert_eq!(remaining_doses(&prn, &[]).to_string(), "PRN");
    }

    #[test]
    fn test_is_complete_course() {
        let p = rx("Every 6 hours", Some("3 days"));
        let mut history: Vec<Administration> = (0..11).map(|h| dose(&p, at(1, 0, h))).collect();
        assert!(!is_complete(&p, &history));

        history.push(dose(&p, at(1, 0, 30)));
        assert!(is_complete(&p, &history));
    }

    #[test]
    fn test_is_complete_one_time() {
        let p = rx("once", Some("1 day"));
        assert!(!is_complete(&p, &[]));
        assert!(is_complete(&p, &[dose(&p, at(1, 8, 0))]));
    }

    #[test]
    fn test_is_complete_prn_never() {
        let p = rx("PRN", None);
        let history: Vec<Administration> = (0..50).map(|h| dose(&p, at(1, 0, h))).collect();
        assert!(!is_complete(&p, &history));
    }

    #[test]
    fn test_completed_flag_is_authoritative() {
        let mut p = rx("Every 6 hours", Some("3 days"));
        p.completed = true;
        assert!(is_complete(&p, &[]));
    }

    #[test]
    fn test_is_dose_due_boundary() {
        let q12h = Periodicity::FixedInterval { hours: 12 };
        let given_at = at(1, 8, 0);

        assert!(is_dose_due(None, q12h, at(1, 8, 0)));
        assert!(!is_dose_due(Some(given_at), q12h, at(1, 19, 59)));
        assert!(is_dose_due(Some(given_at), q12h, at(1, 20, 0)));
    }

    #[test]
    fn test_is_dose_due_one_time() {
        assert!(is_dose_due(None, Periodicity::OneTime, at(1, 8, 0)));
        assert!(!is_dose_due(
            Some(at(1, 8, 0)),
            Periodicity::OneTime,
            at(2, 8, 0)
        ));
    }

    #[test]
    fn test_prn_resets_after_interval() {
        let given_at = at(1, 8, 0);
        assert!(!is_dose_due(Some(given_at), Periodicity::Prn, at(1, 10, 0)));
        assert!(is_dose_due(
            Some(given_at),
            Periodicity::Prn,
            given_at + Duration::hours(PRN_RESET_INTERVAL_HOURS)
        ));
    }

    #[test]
    fn test_classify_status_fixed_interval() {
        let p = rx("q12h", Some("3 days"));
        let graph = ProtocolGraph::new(vec![]);

        assert_eq!(
            classify_status(&p, &[], &graph, at(1, 8, 0)),
            MedicationStatus::Due
        );

        let history = vec![dose(&p, at(1, 8, 0))];
        assert_eq!(
            classify_status(&p, &history, &graph, at(1, 10, 0)),
            MedicationStatus::Administered
        );
        assert_eq!(
            classify_status(&p, &history, &graph, at(1, 20, 0)),
            MedicationStatus::Overdue
        );
    }

    #[test]
    fn test_classify_status_prn_never_overdue() {
        let p = rx("PRN", None);
        let graph = ProtocolGraph::new(vec![]);
        let history = vec![dose(&p, at(1, 8, 0))];

        assert_eq!(
            classify_status(&p, &history, &graph, at(1, 9, 0)),
            MedicationStatus::Administered
        );
        // Interval elapsed: due again, not overdue
        assert_eq!(
            classify_status(&p, &history, &graph, at(2, 8, 0)),
            MedicationStatus::Due
        );
    }

    #[test]
    fn test_classify_status_complete_course() {
        let p = rx("q12h", Some("1 day"));
        let graph = ProtocolGraph::new(vec![]);
        let history = vec![dose(&p, at(1, 8, 0)), dose(&p, at(1, 20, 0))];

        assert_eq!(
            classify_status(&p, &history, &graph, at(2, 8, 0)),
            MedicationStatus::Complete
        );
    }

    #[test]
    fn test_classify_status_protocol_blocked() {
        let mut p = rx("once", Some("1 day"));
        p.medicine_id = "10000069".into();
        let graph = ProtocolGraph::new(vec![crate::models::MedicationLink::new(
            "10000010".into(),
            "10000069".into(),
            60,
        )]);

        match classify_status(&p, &[], &graph, at(1, 8, 0)) {
            MedicationStatus::Blocked { reason } => {
                assert!(reason.contains("trigger"));
            }
            other => panic!("expected Blocked, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_active_prefers_window_containing_now() {
        let now = at(2, 12, 0);

        let mut old = rx("daily", None);
        old.id = "rx-b".into();
        old.start_date = Some(at(1, 0, 0));
        old.end_date = Some(at(1, 23, 0));

        let mut current = rx("daily", None);
        current.id = "rx-a".into();
        current.start_date = Some(at(2, 0, 0));

        let list = vec![old.clone(), current.clone()];
        let chosen = resolve_active_prescription(&list, "10000001", now).unwrap();
        assert_eq!(chosen.id, "rx-a");

        // Same answer regardless of order
        let list = vec![current, old];
        let chosen = resolve_active_prescription(&list, "10000001", now).unwrap();
        assert_eq!(chosen.id, "rx-a");
    }

    #[test]
    fn test_resolve_active_most_recent_start_when_none_active() {
        let now = at(9, 12, 0);

        let mut a = rx("daily", None);
        a.id = "rx-a".into();
        a.start_date = Some(at(1, 0, 0));
        a.end_date = Some(at(2, 0, 0));

        let mut b = rx("daily", None);
        b.id = "rx-b".into();
        b.start_date = Some(at(3, 0, 0));
        b.end_date = Some(at(4, 0, 0));

        let list = vec![a, b];
        let chosen = resolve_active_prescription(&list, "10000001", now).unwrap();
        assert_eq!(chosen.id, "rx-b");
    }

    #[test]
    fn test_resolve_active_id_tiebreak_descending() {
        let now = at(1, 12, 0);

        let mut a = rx("daily", None);
        a.id = "rx-1".into();
        let mut b = rx("daily", None);
        b.id = "rx-2".into();

        let forward = vec![a.clone(), b.clone()];
        let reversed = vec![b, a];
        assert_eq!(
            resolve_active_prescription(&forward, "10000001", now)
                .unwrap()
                .id,
            "rx-2"
        );
        assert_eq!(
            resolve_active_prescription(&reversed, "10000001", now)
                .unwrap()
                .id,
            "rx-2"
        );
    }

    #[test]
    fn test_resolve_active_unknown_medicine() {
        let list = vec![rx("daily", None)];
        assert!(resolve_active_prescription(&list, "10000099", at(1, 8, 0)).is_none());
    }
}
