//! Delayed and repeating signal delivery.
//!
//! [`SpoolProcessor::process_due`] is one synchronous pass over the due
//! entries. The async loop that decides when to run a pass lives in the
//! runtime crate; it learns about freshly spooled entries through a
//! [`SpoolWaker`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use orion_error::ErrorOweBase;
use tokio::sync::Notify;

use crate::error::{CoreReason, CoreResult};
use crate::model::{EventSummary, SpoolEntry, Subscription};
use crate::signal::SignalDispatcher;
use crate::store::Stores;

// ---------------------------------------------------------------------------
// SpoolWaker
// ---------------------------------------------------------------------------

/// Tells the scheduler about a new, possibly earlier, flush time.
///
/// Wakes only lower the scheduler's next deadline. Once closed, wakes are
/// ignored until [`reopen`](Self::reopen). Each reopen starts a new
/// generation so that a stale owner cannot close the waker under its
/// successor.
#[derive(Default)]
pub struct SpoolWaker {
    notify: Notify,
    earliest: Mutex<Option<i64>>,
    closed: AtomicBool,
    generation: Mutex<u64>,
}

impl SpoolWaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an entry that becomes due at `flush_time_ms`.
    pub fn wake_at(&self, flush_time_ms: i64) {
        if self.is_closed() {
            return;
        }
        {
            let mut earliest = self.earliest.lock().unwrap_or_else(PoisonError::into_inner);
            *earliest = Some(earliest.map_or(flush_time_ms, |e| e.min(flush_time_ms)));
        }
        self.notify.notify_one();
    }

    /// Earliest reported flush time since the last call.
    pub fn take_earliest(&self) -> Option<i64> {
        self.earliest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Resolves after the next [`wake_at`](Self::wake_at). A wake that
    /// happened while nobody was waiting is not lost.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.take_earliest();
    }

    /// Close only if no reopen happened since the one that returned
    /// `generation`. Returns whether the waker was closed.
    pub fn close_generation(&self, generation: u64) -> bool {
        let current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != generation {
            return false;
        }
        self.close();
        true
    }

    /// Accept wakes again. Returns the new generation.
    pub fn reopen(&self) -> u64 {
        let mut current = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *current += 1;
        self.closed.store(false, Ordering::SeqCst);
        *current
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// SpoolPass
// ---------------------------------------------------------------------------

/// Tally of one pass over the due spool entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpoolPass {
    /// Signals published.
    pub fired: usize,
    /// Fired entries rescheduled for another repeat.
    pub repeated: usize,
    /// Fired entries removed because they do not repeat.
    pub deleted: usize,
    /// Entries removed without firing.
    pub stale: usize,
    /// Entries whose publish failed; rescheduled after the retry delay.
    pub failed: usize,
    /// Smallest repeat interval among fired entries.
    pub min_repeat: Option<Duration>,
}

impl SpoolPass {
    pub fn is_idle(&self) -> bool {
        self.fired == 0 && self.stale == 0 && self.failed == 0
    }
}

// ---------------------------------------------------------------------------
// SpoolProcessor
// ---------------------------------------------------------------------------

/// Why a due entry was dropped without firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stale {
    SubscriptionGone,
    EventGone,
    TriggerGone,
    TriggerDisabled,
    EventNotOpen,
}

impl Stale {
    fn as_str(self) -> &'static str {
        match self {
            Stale::SubscriptionGone => "subscription gone",
            Stale::EventGone => "event gone",
            Stale::TriggerGone => "trigger gone",
            Stale::TriggerDisabled => "trigger disabled",
            Stale::EventNotOpen => "event not open",
        }
    }
}

/// Retry delay after a failed publish, unless configured otherwise.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

pub struct SpoolProcessor {
    stores: Stores,
    dispatcher: Arc<SignalDispatcher>,
    retry_delay: Duration,
}

impl SpoolProcessor {
    pub fn new(stores: Stores, dispatcher: Arc<SignalDispatcher>) -> Self {
        Self {
            stores,
            dispatcher,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// How long an entry whose publish failed waits before the next attempt.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Earliest flush time currently persisted.
    pub fn next_flush_time(&self) -> CoreResult<Option<i64>> {
        self.stores.spool.next_flush_time().owe(CoreReason::Store)
    }

    /// Fire every entry due at `now_ms`.
    ///
    /// Store failures abort the pass. A publish failure only moves its own
    /// entry to `now_ms` plus the retry delay, so after a successful pass no
    /// entry is due at `now_ms` any more.
    pub fn process_due(&self, now_ms: i64) -> CoreResult<SpoolPass> {
        let due = self
            .stores
            .spool
            .find_all_due(now_ms)
            .owe(CoreReason::Store)?;
        let mut pass = SpoolPass::default();

        for entry in due {
            let (subscription, event) = match self.resolve(&entry)? {
                Ok(found) => found,
                Err(reason) => {
                    self.stores
                        .spool
                        .delete(&entry.uuid)
                        .owe(CoreReason::Store)?;
                    pass.stale += 1;
                    sig_info!(pipe,
                        spool = %entry.uuid,
                        subscription = %entry.subscription_uuid,
                        event = %entry.event_summary_uuid,
                        reason = reason.as_str(),
                        "stale spool entry removed"
                    );
                    continue;
                }
            };

            if let Err(e) = self.dispatcher.dispatch(&event, &subscription, now_ms) {
                let retry_at = now_ms.saturating_add(duration_ms(self.retry_delay));
                self.stores
                    .spool
                    .update_flush_time(&entry.uuid, retry_at)
                    .owe(CoreReason::Store)?;
                sig_warn!(pipe,
                    spool = %entry.uuid,
                    error = %e,
                    retry_at,
                    "spooled signal publish failed"
                );
                pass.failed += 1;
                continue;
            }
            pass.fired += 1;

            if subscription.repeat_seconds > 0 {
                let repeat = Duration::from_secs(u64::from(subscription.repeat_seconds));
                let next = now_ms.saturating_add(duration_ms(repeat));
                self.stores
                    .spool
                    .update_flush_time(&entry.uuid, next)
                    .owe(CoreReason::Store)?;
                pass.repeated += 1;
                pass.min_repeat = Some(pass.min_repeat.map_or(repeat, |m| m.min(repeat)));
            } else {
                self.stores
                    .spool
                    .delete(&entry.uuid)
                    .owe(CoreReason::Store)?;
                pass.deleted += 1;
            }
        }

        if !pass.is_idle() {
            sig_debug!(pipe,
                fired = pass.fired,
                repeated = pass.repeated,
                deleted = pass.deleted,
                stale = pass.stale,
                failed = pass.failed,
                "spool pass"
            );
        }
        Ok(pass)
    }

    /// Look up everything needed to fire `entry`, or the reason it is stale.
    fn resolve(
        &self,
        entry: &SpoolEntry,
    ) -> CoreResult<Result<(Subscription, EventSummary), Stale>> {
        let Some(subscription) = self
            .stores
            .subscriptions
            .find_by_uuid(&entry.subscription_uuid)
            .owe(CoreReason::Store)?
        else {
            return Ok(Err(Stale::SubscriptionGone));
        };
        let Some(event) = self
            .stores
            .events
            .find_by_uuid(&entry.event_summary_uuid)
            .owe(CoreReason::Store)?
        else {
            return Ok(Err(Stale::EventGone));
        };
        match self
            .stores
            .triggers
            .find_by_uuid(&subscription.trigger_uuid)
            .owe(CoreReason::Store)?
        {
            None => return Ok(Err(Stale::TriggerGone)),
            Some(t) if !t.enabled => return Ok(Err(Stale::TriggerDisabled)),
            Some(_) => {}
        }
        if !event.status.is_open() {
            return Ok(Err(Stale::EventNotOpen));
        }
        Ok(Ok((subscription, event)))
    }
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests;
