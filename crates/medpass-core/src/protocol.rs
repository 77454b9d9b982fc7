//! Trigger-to-follow-up protocol links.
//!
//! Some medicines are only given as the follow-up step of a protocol: a
//! trigger medicine is administered first, and the follow-up's collection
//! window opens shortly before a configured delay elapses. When link data
//! cannot be loaded the graph degrades to a fixed allow-list so known
//! protocol medicines stay gated instead of silently becoming unrestricted.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Administration, MedicationLink};

/// Collection opens this long before the strict due time, so the dose can
/// be staged at the bedside.
pub const COLLECTION_MARGIN_MINUTES: i64 = 1;

/// Delay assumed for allow-listed medicines when link data is unavailable.
pub const FALLBACK_DELAY_MINUTES: i64 = 60;

/// Historically-known protocol follow-up medicine ids. Used only when link
/// data fails to load.
const FALLBACK_FOLLOW_UP_IDS: &[&str] = &["10000069", "10000070", "10000046"];

/// Delay configuration for a follow-up medicine.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayInfo {
    /// Trigger medicine; unknown when the graph is running on the fallback
    /// allow-list
    pub trigger_medicine_id: Option<String>,
    /// Minutes between trigger administration and the follow-up's due time
    pub delay_minutes: i64,
}

/// State of a follow-up medicine's collection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    /// Whether collection may proceed
    pub ready: bool,
    /// Time until the window opens, when it has not
    pub time_remaining: Option<Duration>,
}

/// Whether a follow-up medicine may be collected right now.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionDecision {
    /// Not a protocol follow-up; no gate applies
    NotProtocol,
    /// Window is open
    Ready,
    /// The trigger medicine has no qualifying administration yet
    TriggerNotAdministered,
    /// Trigger given, but the window has not opened
    TooEarly { time_remaining: Duration },
    /// The dependency could not be checked; collection stays blocked
    Unverifiable,
}

impl CollectionDecision {
    /// Human-readable blocking reason; `None` when collection may proceed.
    pub fn block_reason(&self) -> Option<String> {
        match self {
            CollectionDecision::NotProtocol | CollectionDecision::Ready => None,
            CollectionDecision::TriggerNotAdministered => {
                Some("trigger medication has not been administered".into())
            }
            CollectionDecision::TooEarly { time_remaining } => Some(format!(
                "collection window opens in {}",
                format_time_remaining(*time_remaining)
            )),
            CollectionDecision::Unverifiable => {
                Some("protocol dependency could not be verified".into())
            }
        }
    }
}

/// Directed graph of trigger-to-follow-up medication links.
#[derive(Debug)]
pub struct ProtocolGraph {
    links: Vec<MedicationLink>,
    degraded: bool,
}

impl ProtocolGraph {
    /// Build from loaded link data.
    pub fn new(links: Vec<MedicationLink>) -> Self {
        Self {
            links,
            degraded: false,
        }
    }

    /// Fail-safe graph for when link data cannot be loaded: the known
    /// follow-up medicines stay gated with a default delay and no known
    /// trigger.
    pub fn fallback() -> Self {
        Self {
            links: Vec::new(),
            degraded: true,
        }
    }

    /// Whether the graph is running on the fallback allow-list.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Whether a medicine is the follow-up side of any link.
    pub fn is_follow_up(&self, medicine_id: &str) -> bool {
        if self.degraded {
            return FALLBACK_FOLLOW_UP_IDS.contains(&medicine_id);
        }
        self.links.iter().any(|l| l.follow_medicine_id == medicine_id)
    }

    /// Delay configuration for a follow-up medicine, if it is one.
    pub fn delay_info(&self, medicine_id: &str) -> Option<DelayInfo> {
        if self.degraded {
            return FALLBACK_FOLLOW_UP_IDS
                .contains(&medicine_id)
                .then(|| DelayInfo {
                    trigger_medicine_id: None,
                    delay_minutes: FALLBACK_DELAY_MINUTES,
                });
        }
        self.links
            .iter()
            .find(|l| l.follow_medicine_id == medicine_id)
            .map(|l| DelayInfo {
                trigger_medicine_id: Some(l.trigger_medicine_id.clone()),
                delay_minutes: l.delay_minutes,
            })
    }

    /// Links whose trigger is the given medicine.
    pub fn links_from(&self, trigger_medicine_id: &str) -> Vec<&MedicationLink> {
        self.links
            .iter()
            .filter(|l| l.trigger_medicine_id == trigger_medicine_id)
            .collect()
    }

    /// Decide whether a medicine may be collected now, given the patient's
    /// administration history.
    pub fn can_collect(
        &self,
        medicine_id: &str,
        administrations: &[Administration],
        now: DateTime<Utc>,
    ) -> CollectionDecision {
        let Some(info) = self.delay_info(medicine_id) else {
            return CollectionDecision::NotProtocol;
        };
        // Fallback entries carry no trigger, so the gate cannot be checked;
        // it fails closed rather than waving the dose through.
        let Some(trigger_id) = info.trigger_medicine_id else {
            return CollectionDecision::Unverifiable;
        };

        let trigger_at = administrations
            .iter()
            .filter(|a| a.medicine_id == trigger_id && a.status.counts_as_given())
            .filter_map(|a| a.administered_at)
            .max();

        match trigger_at {
            None => CollectionDecision::TriggerNotAdministered,
            Some(t) => {
                let window = collection_window(t, info.delay_minutes, now);
                if window.ready {
                    CollectionDecision::Ready
                } else {
                    CollectionDecision::TooEarly {
                        time_remaining: window.time_remaining.unwrap_or_else(Duration::zero),
                    }
                }
            }
        }
    }
}

/// Compute the collection window for a follow-up relative to its trigger's
/// administration time. The window opens [`COLLECTION_MARGIN_MINUTES`]
/// before the strict due time.
pub fn collection_window(
    trigger_administered_at: DateTime<Utc>,
    delay_minutes: i64,
    now: DateTime<Utc>,
) -> CollectionWindow {
    let opens_at = trigger_administered_at + Duration::minutes(delay_minutes)
        - Duration::minutes(COLLECTION_MARGIN_MINUTES);

    if now >= opens_at {
        CollectionWindow {
            ready: true,
            time_remaining: None,
        }
    } else {
        CollectionWindow {
            ready: false,
            time_remaining: Some(opens_at - now),
        }
    }
}

/// Format a countdown as "2h 05m", or "45m" under an hour. Partial minutes
/// round up so the display never undersells the wait.
pub fn format_time_remaining(remaining: Duration) -> String {
    let minutes = (remaining.num_seconds().max(0) + 59) / 60;
    let (h, m) = (minutes / 60, minutes % 60);
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else {
        format!("{}m", m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AdministrationStatus;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    fn given(medicine_id: &str, when: DateTime<Utc>) -> Administration {
        Administration::new_event(
            "p1".into(),
            medicine_id.into(),
            None,
            AdministrationStatus::Administered,
            "administered".into(),
            "nurse-1".into(),
            when,
        )
    }

    fn linked_graph() -> ProtocolGraph {
        ProtocolGraph::new(vec![MedicationLink::new(
            "10000010".into(),
            "10000069".into(),
            60,
        )])
    }

    #[test]
    fn test_follow_up_lookup() {
        let graph = linked_graph();
        assert!(graph.is_follow_up("10000069"));
        assert!(!graph.is_follow_up("10000010"));

        let info = graph.delay_info("10000069").unwrap();
        assert_eq!(info.trigger_medicine_id.as_deref(), Some("10000010"));
        assert_eq!(info.delay_minutes, 60);
        assert!(graph.delay_info("10000010").is_none());
    }

    #[test]
    fn test_collection_window_opens_one_minute_early() {
        let trigger = at(8, 0);

        // 60 minute delay: window opens at T+59m
        let w = collection_window(trigger, 60, at(8, 0));
        assert!(!w.ready);
        assert_eq!(w.time_remaining, Some(Duration::minutes(59)));

        let w = collection_window(trigger, 60, at(8, 58));
        assert!(!w.ready);

        let w = collection_window(trigger, 60, at(8, 59));
        assert!(w.ready);
        assert!(w.time_remaining.is_none());

        let w = collection_window(trigger, 60, at(10, 0));
        assert!(w.ready);
    }

    #[test]
    fn test_can_collect_transitions() {
        let graph = linked_graph();

        // No trigger administration at all
        let d = graph.can_collect("10000069", &[], at(9, 0));
        assert_eq!(d, CollectionDecision::TriggerNotAdministered);
        assert!(d.block_reason().is_some());

        // Trigger recorded but dose not actually given
        let blocked = Administration::new_event(
            "p1".into(),
            "10000010".into(),
            None,
            AdministrationStatus::Blocked,
            "blocked".into(),
            "nurse-1".into(),
            at(8, 0),
        );
        let d = graph.can_collect("10000069", &[blocked], at(9, 0));
        assert_eq!(d, CollectionDecision::TriggerNotAdministered);

        // Trigger given, still inside the delay
        let history = vec![given("10000010", at(8, 0))];
        match graph.can_collect("10000069", &history, at(8, 30)) {
            CollectionDecision::TooEarly { time_remaining } => {
                assert_eq!(time_remaining, Duration::minutes(29));
            }
            other => panic!("expected TooEarly, got {:?}", other),
        }

        // Window open
        let d = graph.can_collect("10000069", &history, at(8, 59));
        assert_eq!(d, CollectionDecision::Ready);
        assert!(d.block_reason().is_none());

        // Unrelated medicine is not gated
        let d = graph.can_collect("10000001", &history, at(8, 0));
        assert_eq!(d, CollectionDecision::NotProtocol);
    }

    #[test]
    fn test_latest_trigger_administration_wins() {
        let graph = linked_graph();
        let history = vec![given("10000010", at(6, 0)), given("10000010", at(8, 0))];

        // Counted from the 08:00 dose, not the 06:00 one
        match graph.can_collect("10000069", &history, at(8, 30)) {
            CollectionDecision::TooEarly { .. } => {}
            other => panic!("expected TooEarly, got {:?}", other),
        }
    }

    #[test]
    fn test_fallback_graph_keeps_known_follow_ups_gated() {
        let graph = ProtocolGraph::fallback();
        assert!(graph.is_degraded());

        for id in ["10000069", "10000070", "10000046"] {
            assert!(graph.is_follow_up(id));
            let d = graph.can_collect(id, &[], at(9, 0));
            assert_eq!(d, CollectionDecision::Unverifiable);
        }

        // Medicines outside the allow-list are not invented
        assert!(!graph.is_follow_up("10000001"));
        assert_eq!(
            graph.can_collect("10000001", &[], at(9, 0)),
            CollectionDecision::NotProtocol
        );
    }

    #[test]
    fn test_format_time_remaining() {
        assert_eq!(format_time_remaining(Duration::minutes(45)), "45m");
        assert_eq!(format_time_remaining(Duration::minutes(125)), "2h 05m");
        assert_eq!(format_time_remaining(Duration::seconds(30)), "1m");
        assert_eq!(format_time_remaining(Duration::seconds(-5)), "0m");
    }
}
