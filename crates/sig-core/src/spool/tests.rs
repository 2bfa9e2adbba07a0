use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::model::{EventSeverity, EventStatus, SpoolEntry};
use crate::signal::MemoryPublisher;
use crate::store::memory::{MemoryStores, MemoryTriggerStore};
use crate::store::{SpoolInsert, SpoolStore, StoreError, StoreResult};
use crate::test_support::*;

const CRITICAL: &str = "evt.severity == 'critical'";

fn one_trigger(delay: u32, repeat: u32) -> Harness {
    Harness::new(vec![trigger(
        "t1",
        CRITICAL,
        vec![subscription("s1", "t1", delay, repeat)],
    )])
}

// ---------------------------------------------------------------------------
// Delay / repeat lifecycle
// ---------------------------------------------------------------------------

#[test]
fn delay_without_repeat_fires_once_then_deletes() {
    let h = one_trigger(30, 0);
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));

    // not yet due
    let early = h.spool.process_due(T0 + 29_999).unwrap();
    assert!(early.is_idle());
    assert!(h.publisher.is_empty());

    let pass = h.spool.process_due(T0 + 30_000).unwrap();
    assert_eq!(pass.fired, 1);
    assert_eq!(pass.deleted, 1);
    assert_eq!(pass.min_repeat, None);
    assert!(h.mem.spool.is_empty());

    let signals = h.publisher.signals();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].created_time, T0 + 30_000);
    assert_eq!(signals[0].event.uuid, "e1");

    // nothing more to do
    assert!(h.spool.process_due(T0 + 90_000).unwrap().is_idle());
    assert_eq!(h.publisher.len(), 1);
}

#[test]
fn delay_with_repeat_fires_until_event_clears() {
    let h = one_trigger(10, 20);
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));

    let first = h.spool.process_due(T0 + 10_000).unwrap();
    assert_eq!(first.fired, 1);
    assert_eq!(first.repeated, 1);
    assert_eq!(first.min_repeat, Some(Duration::from_secs(20)));
    let entry = &h.mem.spool.entries()[0];
    assert_eq!(entry.flush_time, T0 + 30_000);
    assert_eq!(h.spool.next_flush_time().unwrap(), Some(T0 + 30_000));

    let second = h.spool.process_due(T0 + 30_000).unwrap();
    assert_eq!(second.fired, 1);
    assert_eq!(h.mem.spool.entries()[0].flush_time, T0 + 50_000);

    // the event clears: the processor cancels the spool
    h.clock.advance_secs(40);
    let outcome = h.ingest(&summary("e1", EventSeverity::Clear, EventStatus::Cleared));
    assert_eq!(outcome.cancelled, 1);

    let after = h.spool.process_due(T0 + 50_000).unwrap();
    assert!(after.is_idle());
    assert_eq!(h.publisher.len(), 2);
}

#[test]
fn min_repeat_is_smallest_among_fired() {
    let h = Harness::new(vec![trigger(
        "t1",
        CRITICAL,
        vec![
            subscription("s1", "t1", 5, 300),
            subscription("s2", "t1", 5, 45),
            subscription("s3", "t1", 5, 0),
        ],
    )]);
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));
    let pass = h.spool.process_due(T0 + 5_000).unwrap();
    assert_eq!(pass.fired, 3);
    assert_eq!(pass.repeated, 2);
    assert_eq!(pass.deleted, 1);
    assert_eq!(pass.min_repeat, Some(Duration::from_secs(45)));
}

// ---------------------------------------------------------------------------
// Stale entries
// ---------------------------------------------------------------------------

#[test]
fn entry_for_non_open_event_is_stale() {
    let h = one_trigger(30, 0);
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));
    // acknowledged is still open
    h.mem
        .events
        .upsert(summary("e1", EventSeverity::Critical, EventStatus::Acknowledged));
    h.clock.advance_secs(1);
    h.ingest(&summary("e2", EventSeverity::Critical, EventStatus::New));
    h.mem
        .events
        .upsert(summary("e2", EventSeverity::Critical, EventStatus::Closed));

    let pass = h.spool.process_due(T0 + 60_000).unwrap();
    assert_eq!(pass.fired, 1);
    assert_eq!(pass.stale, 1);
    assert!(h.mem.spool.is_empty());
    assert_eq!(h.publisher.signals()[0].event.uuid, "e1");
}

#[test]
fn entry_for_deleted_event_is_stale() {
    let h = one_trigger(30, 0);
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));
    h.mem.events.remove("e1");

    let pass = h.spool.process_due(T0 + 30_000).unwrap();
    assert_eq!(pass.stale, 1);
    assert_eq!(pass.fired, 0);
    assert!(h.mem.spool.is_empty());
}

#[test]
fn entry_for_disabled_trigger_is_stale() {
    let h = one_trigger(30, 60);
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));
    h.mem.triggers.set_enabled("t1", false);

    let pass = h.spool.process_due(T0 + 30_000).unwrap();
    assert_eq!(pass.stale, 1);
    assert!(h.publisher.is_empty());
    assert!(h.mem.spool.is_empty());
}

#[test]
fn entry_for_removed_trigger_is_stale() {
    let h = one_trigger(30, 0);
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));
    h.mem.triggers.remove("t1");

    let pass = h.spool.process_due(T0 + 30_000).unwrap();
    // the subscription went with its trigger
    assert_eq!(pass.stale, 1);
    assert!(h.mem.spool.is_empty());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn publish_failure_reschedules_entry_for_retry() {
    let h = Harness::new(vec![trigger(
        "t1",
        CRITICAL,
        vec![subscription("s1", "t1", 30, 0)],
    )]);
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));
    h.ingest(&summary("e2", EventSeverity::Critical, EventStatus::New));

    h.publisher.set_failing(true);
    let pass = h.spool.process_due(T0 + 30_000).unwrap();
    assert_eq!(pass.failed, 2);
    assert_eq!(pass.fired, 0);
    assert_eq!(h.mem.spool.len(), 2);
    let retry_at = T0 + 30_000 + DEFAULT_RETRY_DELAY.as_millis() as i64;
    assert_eq!(h.spool.next_flush_time().unwrap(), Some(retry_at));

    // not due again until the retry delay has passed
    h.publisher.set_failing(false);
    assert!(h.spool.process_due(T0 + 31_000).unwrap().is_idle());
    let retry = h.spool.process_due(retry_at).unwrap();
    assert_eq!(retry.fired, 2);
    assert!(h.mem.spool.is_empty());
}

#[test]
fn retry_delay_is_configurable() {
    let h = one_trigger(10, 0);
    let spool = SpoolProcessor::new(h.mem.stores(), h.dispatcher.clone())
        .with_retry_delay(Duration::from_secs(5));
    h.ingest(&summary("e1", EventSeverity::Critical, EventStatus::New));

    h.publisher.set_failing(true);
    assert_eq!(spool.process_due(T0 + 10_000).unwrap().failed, 1);
    assert_eq!(spool.next_flush_time().unwrap(), Some(T0 + 15_000));
}

/// Spool store whose `find_all_due` always fails.
struct UnavailableSpool;

impl SpoolStore for UnavailableSpool {
    fn create(&self, entry: &SpoolEntry) -> StoreResult<SpoolInsert> {
        Ok(SpoolInsert::Created(entry.uuid.clone()))
    }
    fn delete(&self, _uuid: &str) -> StoreResult<bool> {
        Ok(false)
    }
    fn delete_by_trigger_and_event(&self, _t: &str, _e: &str) -> StoreResult<usize> {
        Ok(0)
    }
    fn find_all_due(&self, _now_ms: i64) -> StoreResult<Vec<SpoolEntry>> {
        Err(StoreError::Unavailable("spool table locked".into()))
    }
    fn update_flush_time(&self, _uuid: &str, _flush_time: i64) -> StoreResult<bool> {
        Ok(false)
    }
    fn find_by_subscription_and_event(
        &self,
        _s: &str,
        _e: &str,
    ) -> StoreResult<Option<SpoolEntry>> {
        Ok(None)
    }
    fn find_all_by_event_summary(&self, _e: &str) -> StoreResult<Vec<SpoolEntry>> {
        Ok(vec![])
    }
    fn next_flush_time(&self) -> StoreResult<Option<i64>> {
        Err(StoreError::Unavailable("spool table locked".into()))
    }
}

#[test]
fn store_failure_aborts_pass() {
    let mem = MemoryStores::new(MemoryTriggerStore::new());
    let mut stores = mem.stores();
    stores.spool = Arc::new(UnavailableSpool);
    let dispatcher = Arc::new(SignalDispatcher::new(
        Arc::new(MemoryPublisher::new()),
        mem.events.clone(),
    ));
    let processor = SpoolProcessor::new(stores, dispatcher);
    assert!(processor.process_due(T0).is_err());
    assert!(processor.next_flush_time().is_err());
}

// ---------------------------------------------------------------------------
// Waker
// ---------------------------------------------------------------------------

#[test]
fn waker_keeps_earliest_deadline() {
    let waker = SpoolWaker::new();
    waker.wake_at(500);
    waker.wake_at(200);
    waker.wake_at(900);
    assert_eq!(waker.take_earliest(), Some(200));
    assert_eq!(waker.take_earliest(), None);
}

#[test]
fn waker_close_and_reopen() {
    let waker = SpoolWaker::new();
    waker.wake_at(100);
    waker.close();
    assert!(waker.is_closed());
    assert_eq!(waker.take_earliest(), None);
    waker.wake_at(50);
    assert_eq!(waker.take_earliest(), None);
    waker.reopen();
    waker.wake_at(70);
    assert_eq!(waker.take_earliest(), Some(70));
}

#[test]
fn waker_ignores_close_from_an_older_generation() {
    let waker = SpoolWaker::new();
    let first = waker.reopen();
    let second = waker.reopen();
    assert_ne!(first, second);

    assert!(!waker.close_generation(first));
    assert!(!waker.is_closed());
    waker.wake_at(10);
    assert_eq!(waker.take_earliest(), Some(10));

    assert!(waker.close_generation(second));
    assert!(waker.is_closed());
}
