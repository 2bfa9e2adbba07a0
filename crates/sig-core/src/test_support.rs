use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::clock::Clock;
use crate::model::{
    Event, EventSeverity, EventStatus, EventSummary, Rule, Subscription, Trigger,
};
use crate::rule::RuleEvaluator;
use crate::signal::{MemoryPublisher, SignalDispatcher};
use crate::spool::{SpoolProcessor, SpoolWaker};
use crate::store::memory::{MemoryStores, MemoryTriggerStore};
use crate::trigger::TriggerProcessor;

pub const T0: i64 = 1_700_000_000_000;

pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(ms)))
    }

    pub fn advance_secs(&self, secs: i64) {
        self.0.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn subscription(uuid: &str, trigger: &str, delay: u32, repeat: u32) -> Subscription {
    Subscription {
        uuid: uuid.into(),
        trigger_uuid: trigger.into(),
        subscriber_uuid: format!("subscriber-{uuid}"),
        delay_seconds: delay,
        repeat_seconds: repeat,
        send_initial_occurrence: false,
    }
}

pub fn trigger(uuid: &str, rule: &str, subscriptions: Vec<Subscription>) -> Trigger {
    Trigger {
        uuid: uuid.into(),
        name: Some(format!("trigger {uuid}")),
        enabled: true,
        rule: Some(Rule {
            api_version: 1,
            source: rule.into(),
        }),
        subscriptions,
    }
}

pub fn summary(uuid: &str, severity: EventSeverity, status: EventStatus) -> EventSummary {
    EventSummary {
        uuid: uuid.into(),
        occurrences: vec![Event {
            uuid: format!("{uuid}-occ"),
            summary: Some(format!("summary of {uuid}")),
            message: Some(format!("message of {uuid}")),
            severity,
            created_time: T0,
            ..Default::default()
        }],
        status,
        count: 1,
        current_user_name: None,
        cleared_by_event_uuid: None,
    }
}

/// Fully wired in-memory processor + spool pass.
pub struct Harness {
    pub mem: MemoryStores,
    pub publisher: Arc<MemoryPublisher>,
    pub waker: Arc<SpoolWaker>,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<SignalDispatcher>,
    pub processor: TriggerProcessor,
    pub spool: SpoolProcessor,
}

impl Harness {
    pub fn new(triggers: Vec<Trigger>) -> Self {
        let mem = MemoryStores::new(MemoryTriggerStore::from_triggers(triggers));
        let publisher = Arc::new(MemoryPublisher::new());
        let waker = Arc::new(SpoolWaker::new());
        let clock = ManualClock::new(T0);
        let dispatcher = Arc::new(SignalDispatcher::new(
            publisher.clone(),
            mem.events.clone(),
        ));
        let processor = TriggerProcessor::new(
            mem.stores(),
            Arc::new(RuleEvaluator::with_capacity(32)),
            dispatcher.clone(),
        )
        .with_clock(clock.clone())
        .with_waker(waker.clone());
        let spool = SpoolProcessor::new(mem.stores(), dispatcher.clone());
        Self {
            mem,
            publisher,
            waker,
            clock,
            dispatcher,
            processor,
            spool,
        }
    }

    /// Store the event (as the upstream pipeline would) and process it.
    pub fn ingest(&self, summary: &EventSummary) -> crate::trigger::EventOutcome {
        self.mem.events.upsert(summary.clone());
        self.processor.on_event(summary).unwrap()
    }

    pub fn now(&self) -> i64 {
        self.clock.now_ms()
    }
}
