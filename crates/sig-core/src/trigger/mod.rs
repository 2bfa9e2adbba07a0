use std::sync::Arc;

use orion_error::ErrorOweBase;

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreReason, CoreResult};
use crate::model::{EventSummary, SpoolEntry, Subscription};
use crate::rule::{RuleContext, RuleEvaluator};
use crate::signal::SignalDispatcher;
use crate::spool::SpoolWaker;
use crate::store::{SpoolInsert, Stores};

/// Per-event tally returned by [`TriggerProcessor::on_event`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    /// Triggers whose rule matched.
    pub matched: usize,
    /// Signals published immediately.
    pub dispatched: usize,
    /// New spool entries created.
    pub spooled: usize,
    /// Spool entries removed because the event cleared.
    pub cancelled: usize,
}

/// Decides, for each processed event, which subscriptions get a signal now,
/// which get a delayed one, and which pending ones are cancelled.
pub struct TriggerProcessor {
    stores: Stores,
    evaluator: Arc<RuleEvaluator>,
    dispatcher: Arc<SignalDispatcher>,
    clock: Arc<dyn Clock>,
    waker: Option<Arc<SpoolWaker>>,
}

impl TriggerProcessor {
    pub fn new(
        stores: Stores,
        evaluator: Arc<RuleEvaluator>,
        dispatcher: Arc<SignalDispatcher>,
    ) -> Self {
        Self {
            stores,
            evaluator,
            dispatcher,
            clock: Arc::new(SystemClock),
            waker: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Notify `waker` whenever a new spool entry is created.
    pub fn with_waker(mut self, waker: Arc<SpoolWaker>) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn on_event(&self, summary: &EventSummary) -> CoreResult<EventOutcome> {
        self.on_event_at(summary, self.clock.now_ms())
    }

    pub fn on_event_at(&self, summary: &EventSummary, now_ms: i64) -> CoreResult<EventOutcome> {
        let triggers = self
            .stores
            .triggers
            .find_all_enabled_with_subscriptions()
            .owe(CoreReason::Store)?;
        let is_clear = summary.is_clear();
        let mut ctx: Option<RuleContext> = None;
        let mut outcome = EventOutcome::default();

        for trigger in &triggers {
            if is_clear {
                outcome.cancelled += self
                    .stores
                    .spool
                    .delete_by_trigger_and_event(&trigger.uuid, &summary.uuid)
                    .owe(CoreReason::Store)?;
            }
            if !trigger.enabled || trigger.subscriptions.is_empty() {
                continue;
            }
            let Some(rule) = trigger.active_rule() else {
                continue;
            };

            let ctx = ctx.get_or_insert_with(|| RuleContext::build(summary));
            if !self.evaluator.evaluate_rule(rule, ctx) {
                continue;
            }
            sig_debug!(pipe, trigger = trigger.display_name(), event = %summary.uuid, "trigger matched");
            outcome.matched += 1;

            for subscription in &trigger.subscriptions {
                if subscription.delay_seconds > 0 && !is_clear {
                    if self.spool(subscription, summary, now_ms)? {
                        outcome.spooled += 1;
                    }
                } else {
                    self.dispatcher.dispatch(summary, subscription, now_ms)?;
                    outcome.dispatched += 1;
                }
            }
        }

        sig_debug!(pipe,
            event = %summary.uuid,
            triggers = triggers.len(),
            matched = outcome.matched,
            dispatched = outcome.dispatched,
            spooled = outcome.spooled,
            cancelled = outcome.cancelled,
            "event processed"
        );
        Ok(outcome)
    }

    /// Returns true if a new entry was created.
    fn spool(
        &self,
        subscription: &Subscription,
        summary: &EventSummary,
        now_ms: i64,
    ) -> CoreResult<bool> {
        let entry = SpoolEntry::for_delay(subscription, summary, now_ms);
        match self
            .stores
            .spool
            .create(&entry)
            .owe(CoreReason::Store)?
        {
            SpoolInsert::Created(_) => {
                if let Some(waker) = &self.waker {
                    waker.wake_at(entry.flush_time);
                }
                Ok(true)
            }
            SpoolInsert::Existing(existing) => {
                sig_debug!(pipe,
                    spool = %existing,
                    subscription = %subscription.uuid,
                    event = %summary.uuid,
                    "signal already spooled"
                );
                Ok(false)
            }
        }
    }
}
