mod publisher;

use std::sync::Arc;

use orion_error::ErrorOweBase;
use orion_error::prelude::*;
use serde::{Deserialize, Serialize};

pub use publisher::{FanOutPublisher, JsonlSignalPublisher, MemoryPublisher, SignalPublisher};

use crate::error::{CoreReason, CoreResult};
use crate::model::{EventStatus, EventSummary, Subscription};
use crate::store::EventSummaryStore;

/// Outbound notification for one subscriber about one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub uuid: String,
    /// Epoch milliseconds.
    pub created_time: i64,
    pub event: EventSummary,
    pub subscriber_uuid: String,
    pub trigger_uuid: String,
    pub clear: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_event: Option<EventSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Builds signals and hands them to the publisher.
pub struct SignalDispatcher {
    publisher: Arc<dyn SignalPublisher>,
    events: Arc<dyn EventSummaryStore>,
}

impl SignalDispatcher {
    pub fn new(publisher: Arc<dyn SignalPublisher>, events: Arc<dyn EventSummaryStore>) -> Self {
        Self { publisher, events }
    }

    pub fn build_signal(
        &self,
        summary: &EventSummary,
        subscription: &Subscription,
        now_ms: i64,
    ) -> Signal {
        let clear = summary.status == EventStatus::Cleared;
        let clear_event = if clear {
            self.lookup_clear_event(summary)
        } else {
            None
        };
        Signal {
            uuid: uuid::Uuid::new_v4().to_string(),
            created_time: now_ms,
            event: summary.clone(),
            subscriber_uuid: subscription.subscriber_uuid.clone(),
            trigger_uuid: subscription.trigger_uuid.clone(),
            clear,
            clear_event,
            message: summary.latest().and_then(|e| e.message.clone()),
        }
    }

    fn lookup_clear_event(&self, summary: &EventSummary) -> Option<EventSummary> {
        let clear_uuid = summary.cleared_by_event_uuid.as_deref()?;
        match self.events.find_by_uuid(clear_uuid) {
            Ok(Some(found)) => Some(found),
            Ok(None) => {
                sig_warn!(res, event = %summary.uuid, clear_event = clear_uuid, "clearing event not found");
                None
            }
            Err(e) => {
                sig_warn!(res, event = %summary.uuid, clear_event = clear_uuid, error = %e, "clearing event lookup failed");
                None
            }
        }
    }

    /// Build and publish. The published signal is returned.
    pub fn dispatch(
        &self,
        summary: &EventSummary,
        subscription: &Subscription,
        now_ms: i64,
    ) -> CoreResult<Signal> {
        let signal = self.build_signal(summary, subscription, now_ms);
        self.publisher
            .publish(&signal)
            .owe(CoreReason::Publish)
            .position(format!(
                "subscriber {} trigger {}",
                signal.subscriber_uuid, signal.trigger_uuid
            ))?;
        sig_debug!(pipe,
            signal = %signal.uuid,
            event = %summary.uuid,
            subscriber = %signal.subscriber_uuid,
            clear = signal.clear,
            "signal published"
        );
        Ok(signal)
    }
}
