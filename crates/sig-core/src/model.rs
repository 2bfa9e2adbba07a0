use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event detail names
// ---------------------------------------------------------------------------

pub const DETAIL_DEVICE_PRODUCTION_STATE: &str = "zenoss.device.production_state";
pub const DETAIL_DEVICE_PRIORITY: &str = "zenoss.device.priority";
pub const DETAIL_DEVICE_CLASS: &str = "zenoss.device.device_class";
pub const DETAIL_DEVICE_IP_ADDRESS: &str = "zenoss.device.ip_address";
pub const DETAIL_DEVICE_LOCATION: &str = "zenoss.device.location";
pub const DETAIL_DEVICE_GROUPS: &str = "zenoss.device.groups";
pub const DETAIL_DEVICE_SYSTEMS: &str = "zenoss.device.systems";

// ---------------------------------------------------------------------------
// Triggers & subscriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    pub source: String,
}

fn default_api_version() -> u32 {
    sig_lang::RULE_API_VERSION
}

/// A named rule plus the subscribers that want signals when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub uuid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub rule: Option<Rule>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

fn default_enabled() -> bool {
    true
}

impl Trigger {
    /// The trigger's rule, if it carries a non-empty one.
    pub fn active_rule(&self) -> Option<&Rule> {
        self.rule.as_ref().filter(|r| !r.source.trim().is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.uuid)
    }
}

/// Debounce policy for one (trigger, subscriber) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub uuid: String,
    pub trigger_uuid: String,
    pub subscriber_uuid: String,
    #[serde(default)]
    pub delay_seconds: u32,
    #[serde(default)]
    pub repeat_seconds: u32,
    #[serde(default)]
    pub send_initial_occurrence: bool,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Ordered severity. `Clear` means the condition has cleared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Clear,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl EventSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            EventSeverity::Clear => "clear",
            EventSeverity::Debug => "debug",
            EventSeverity::Info => "info",
            EventSeverity::Warning => "warning",
            EventSeverity::Error => "error",
            EventSeverity::Critical => "critical",
        }
    }

    pub fn is_clear(self) -> bool {
        self == EventSeverity::Clear
    }
}

impl fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    New,
    Acknowledged,
    Suppressed,
    Closed,
    Cleared,
    Dropped,
    Aged,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::New => "new",
            EventStatus::Acknowledged => "acknowledged",
            EventStatus::Suppressed => "suppressed",
            EventStatus::Closed => "closed",
            EventStatus::Cleared => "cleared",
            EventStatus::Dropped => "dropped",
            EventStatus::Aged => "aged",
        }
    }

    /// Statuses in which a spooled signal may still fire.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            EventStatus::New | EventStatus::Acknowledged | EventStatus::Suppressed
        )
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelElementType {
    Device,
    Component,
    Service,
    Organizer,
    Other,
}

/// Identity of the model elements an occurrence is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventActor {
    pub element_type_id: Option<ModelElementType>,
    pub element_identifier: Option<String>,
    pub element_uuid: Option<String>,
    pub element_sub_type_id: Option<ModelElementType>,
    pub element_sub_identifier: Option<String>,
    pub element_sub_uuid: Option<String>,
}

/// Identifier and uuid of one actor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorElement<'a> {
    pub identifier: Option<&'a str>,
    pub uuid: Option<&'a str>,
}

impl EventActor {
    /// The slot (primary first, then secondary) typed `ty`.
    pub fn element(&self, ty: ModelElementType) -> Option<ActorElement<'_>> {
        if self.element_type_id == Some(ty) {
            return Some(ActorElement {
                identifier: self.element_identifier.as_deref(),
                uuid: self.element_uuid.as_deref(),
            });
        }
        if self.element_sub_type_id == Some(ty) {
            return Some(ActorElement {
                identifier: self.element_sub_identifier.as_deref(),
                uuid: self.element_sub_uuid.as_deref(),
            });
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDetail {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// One occurrence of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub uuid: String,
    pub summary: Option<String>,
    pub message: Option<String>,
    pub event_class: Option<String>,
    pub event_class_key: Option<String>,
    pub fingerprint: Option<String>,
    pub event_key: Option<String>,
    pub agent: Option<String>,
    pub monitor: Option<String>,
    pub severity: EventSeverity,
    pub syslog_priority: Option<i32>,
    pub syslog_facility: Option<i32>,
    pub nt_event_code: Option<i32>,
    pub actor: Option<EventActor>,
    pub details: Vec<EventDetail>,
    pub created_time: i64,
}

impl Event {
    /// Values of the first detail named `name`.
    pub fn detail(&self, name: &str) -> Option<&[String]> {
        self.details
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.values.as_slice())
    }
}

/// Deduplicated event with its occurrence history, latest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub uuid: String,
    #[serde(default)]
    pub occurrences: Vec<Event>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub current_user_name: Option<String>,
    #[serde(default)]
    pub cleared_by_event_uuid: Option<String>,
}

impl EventSummary {
    pub fn latest(&self) -> Option<&Event> {
        self.occurrences.first()
    }

    /// True when the latest occurrence has `Clear` severity.
    pub fn is_clear(&self) -> bool {
        self.latest().is_some_and(|e| e.severity.is_clear())
    }
}

// ---------------------------------------------------------------------------
// Spool
// ---------------------------------------------------------------------------

/// A delayed or repeating notification waiting for its flush time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolEntry {
    pub uuid: String,
    pub subscription_uuid: String,
    pub event_summary_uuid: String,
    /// Epoch milliseconds.
    pub created: i64,
    /// Epoch milliseconds at which the entry becomes due.
    pub flush_time: i64,
    pub event_count: u32,
}

impl SpoolEntry {
    /// New entry due `delay_seconds` after `now_ms`.
    pub fn for_delay(subscription: &Subscription, summary: &EventSummary, now_ms: i64) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            subscription_uuid: subscription.uuid.clone(),
            event_summary_uuid: summary.uuid.clone(),
            created: now_ms,
            flush_time: now_ms + i64::from(subscription.delay_seconds) * 1000,
            event_count: 1,
        }
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.flush_time <= now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_and_names() {
        assert!(EventSeverity::Clear < EventSeverity::Debug);
        assert!(EventSeverity::Error < EventSeverity::Critical);
        assert_eq!(EventSeverity::Warning.to_string(), "warning");
        let s: EventSeverity = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(s, EventSeverity::Critical);
    }

    #[test]
    fn open_statuses() {
        assert!(EventStatus::New.is_open());
        assert!(EventStatus::Acknowledged.is_open());
        assert!(EventStatus::Suppressed.is_open());
        assert!(!EventStatus::Closed.is_open());
        assert!(!EventStatus::Cleared.is_open());
        assert!(!EventStatus::Aged.is_open());
    }

    #[test]
    fn actor_element_prefers_primary_slot() {
        let actor = EventActor {
            element_type_id: Some(ModelElementType::Device),
            element_identifier: Some("router1".into()),
            element_uuid: Some("dev-1".into()),
            element_sub_type_id: Some(ModelElementType::Component),
            element_sub_identifier: Some("eth0".into()),
            element_sub_uuid: Some("comp-1".into()),
        };
        let dev = actor.element(ModelElementType::Device).unwrap();
        assert_eq!(dev.identifier, Some("router1"));
        let comp = actor.element(ModelElementType::Component).unwrap();
        assert_eq!(comp.uuid, Some("comp-1"));
        assert!(actor.element(ModelElementType::Service).is_none());
    }

    #[test]
    fn summary_deserializes_with_defaults() {
        let json = r#"{"uuid":"e1","occurrences":[{"uuid":"o1","severity":"clear"}]}"#;
        let summary: EventSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.status, EventStatus::New);
        assert!(summary.is_clear());
        assert_eq!(summary.latest().unwrap().message, None);
    }

    #[test]
    fn spool_entry_flush_time_from_delay() {
        let sub = Subscription {
            uuid: "s1".into(),
            trigger_uuid: "t1".into(),
            subscriber_uuid: "u1".into(),
            delay_seconds: 30,
            repeat_seconds: 0,
            send_initial_occurrence: false,
        };
        let summary = EventSummary {
            uuid: "e1".into(),
            occurrences: vec![],
            status: EventStatus::New,
            count: 1,
            current_user_name: None,
            cleared_by_event_uuid: None,
        };
        let entry = SpoolEntry::for_delay(&sub, &summary, 1_000);
        assert_eq!(entry.flush_time, 31_000);
        assert!(!entry.is_due(30_999));
        assert!(entry.is_due(31_000));
    }
}
