use std::collections::BTreeMap;

use crate::model::{
    DETAIL_DEVICE_CLASS, DETAIL_DEVICE_GROUPS, DETAIL_DEVICE_IP_ADDRESS, DETAIL_DEVICE_LOCATION,
    DETAIL_DEVICE_PRIORITY, DETAIL_DEVICE_PRODUCTION_STATE, DETAIL_DEVICE_SYSTEMS, Event,
    EventSummary, ModelElementType,
};

use super::value::Value;

/// Read-only projection of one event summary into the `evt`, `dev`,
/// `component` and `service` namespaces seen by rule expressions.
///
/// Every documented field is always present; missing data maps to `""`,
/// `0` or an empty list.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleContext {
    namespaces: BTreeMap<&'static str, Value>,
}

impl RuleContext {
    pub fn build(summary: &EventSummary) -> Self {
        let fallback = Event::default();
        let occurrence = summary.latest().unwrap_or(&fallback);

        let mut namespaces = BTreeMap::new();
        namespaces.insert("evt", evt_object(summary, occurrence));
        namespaces.insert("dev", dev_object(occurrence));
        namespaces.insert(
            "component",
            identity_object(occurrence, ModelElementType::Component),
        );
        namespaces.insert(
            "service",
            identity_object(occurrence, ModelElementType::Service),
        );
        Self { namespaces }
    }

    /// Top-level namespace object.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.namespaces.get(name)
    }

    /// Convenience lookup of `ns.name`.
    pub fn field(&self, ns: &str, name: &str) -> Option<&Value> {
        match self.get(ns)? {
            Value::Object(fields) => fields.get(name),
            _ => None,
        }
    }
}

fn opt_str(v: Option<&str>) -> Value {
    Value::str(v.unwrap_or_default())
}

fn opt_int(v: Option<i32>) -> Value {
    Value::int(i64::from(v.unwrap_or(0)))
}

fn evt_object(summary: &EventSummary, occ: &Event) -> Value {
    let mut f = BTreeMap::new();
    f.insert("summary".into(), opt_str(occ.summary.as_deref()));
    f.insert("message".into(), opt_str(occ.message.as_deref()));
    f.insert("event_class".into(), opt_str(occ.event_class.as_deref()));
    f.insert(
        "event_class_key".into(),
        opt_str(occ.event_class_key.as_deref()),
    );
    f.insert("fingerprint".into(), opt_str(occ.fingerprint.as_deref()));
    f.insert("event_key".into(), opt_str(occ.event_key.as_deref()));
    f.insert("agent".into(), opt_str(occ.agent.as_deref()));
    f.insert("monitor".into(), opt_str(occ.monitor.as_deref()));
    f.insert("severity".into(), Value::str(occ.severity.as_str()));
    f.insert("syslog_priority".into(), opt_int(occ.syslog_priority));
    f.insert("syslog_facility".into(), opt_int(occ.syslog_facility));
    f.insert("nt_event_code".into(), opt_int(occ.nt_event_code));
    f.insert("count".into(), Value::int(i64::from(summary.count)));
    f.insert("status".into(), Value::str(summary.status.as_str()));
    f.insert(
        "current_user_name".into(),
        opt_str(summary.current_user_name.as_deref()),
    );
    Value::Object(f)
}

fn identity_fields(occ: &Event, ty: ModelElementType) -> BTreeMap<String, Value> {
    let element = occ.actor.as_ref().and_then(|a| a.element(ty));
    let mut f = BTreeMap::new();
    f.insert("name".into(), opt_str(element.and_then(|e| e.identifier)));
    f.insert("uuid".into(), opt_str(element.and_then(|e| e.uuid)));
    f
}

fn identity_object(occ: &Event, ty: ModelElementType) -> Value {
    Value::Object(identity_fields(occ, ty))
}

fn dev_object(occ: &Event) -> Value {
    let mut f = identity_fields(occ, ModelElementType::Device);
    f.insert(
        "production_state".into(),
        detail_int(occ, DETAIL_DEVICE_PRODUCTION_STATE),
    );
    f.insert("priority".into(), detail_int(occ, DETAIL_DEVICE_PRIORITY));
    f.insert("device_class".into(), detail_str(occ, DETAIL_DEVICE_CLASS));
    f.insert("ip_address".into(), detail_str(occ, DETAIL_DEVICE_IP_ADDRESS));
    f.insert("location".into(), detail_str(occ, DETAIL_DEVICE_LOCATION));
    f.insert("groups".into(), detail_list(occ, DETAIL_DEVICE_GROUPS));
    f.insert("systems".into(), detail_list(occ, DETAIL_DEVICE_SYSTEMS));
    Value::Object(f)
}

fn detail_first<'a>(occ: &'a Event, name: &str) -> Option<&'a str> {
    occ.detail(name)
        .and_then(|values| values.first())
        .map(String::as_str)
}

fn detail_str(occ: &Event, name: &str) -> Value {
    opt_str(detail_first(occ, name))
}

fn detail_int(occ: &Event, name: &str) -> Value {
    let Some(raw) = detail_first(occ, name) else {
        return Value::int(0);
    };
    match raw.trim().parse::<i64>() {
        Ok(n) => Value::int(n),
        Err(e) => {
            sig_warn!(pipe, detail = name, value = raw, error = %e, "unparsable integer detail");
            Value::int(0)
        }
    }
}

fn detail_list(occ: &Event, name: &str) -> Value {
    let items = occ
        .detail(name)
        .unwrap_or_default()
        .iter()
        .map(|v| Value::str(v.as_str()))
        .collect();
    Value::List(items)
}
