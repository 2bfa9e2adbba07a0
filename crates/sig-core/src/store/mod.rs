//! Persistence boundaries used by the trigger processor and the spool pass.
//!
//! All traits are synchronous and shared across threads. Implementations
//! report failures as [`StoreError`]; callers lift them into
//! [`CoreReason::Store`](crate::error::CoreReason::Store).

pub mod memory;

use std::sync::Arc;

use crate::model::{EventSummary, SpoolEntry, Subscription, Trigger};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store constraint violated: {0}")]
    Constraint(String),
    #[error("store error: {0}")]
    Other(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait TriggerStore: Send + Sync {
    /// Enabled triggers that have at least one subscription.
    fn find_all_enabled_with_subscriptions(&self) -> StoreResult<Vec<Trigger>>;
    fn find_by_uuid(&self, uuid: &str) -> StoreResult<Option<Trigger>>;
}

pub trait SubscriptionStore: Send + Sync {
    fn find_by_uuid(&self, uuid: &str) -> StoreResult<Option<Subscription>>;
}

pub trait EventSummaryStore: Send + Sync {
    fn find_by_uuid(&self, uuid: &str) -> StoreResult<Option<EventSummary>>;
}

/// Result of [`SpoolStore::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoolInsert {
    /// A new entry was stored under this id.
    Created(String),
    /// An entry for the same (subscription, event) pair already exists.
    Existing(String),
}

impl SpoolInsert {
    pub fn id(&self) -> &str {
        match self {
            SpoolInsert::Created(id) | SpoolInsert::Existing(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SpoolInsert::Created(_))
    }
}

/// Durable delay/repeat queue.
///
/// At most one entry exists per (subscription, event summary) pair;
/// `create` must enforce this atomically.
pub trait SpoolStore: Send + Sync {
    fn create(&self, entry: &SpoolEntry) -> StoreResult<SpoolInsert>;
    fn delete(&self, uuid: &str) -> StoreResult<bool>;
    /// Delete every entry for `event_summary_uuid` whose subscription belongs
    /// to `trigger_uuid`. Returns the number removed.
    fn delete_by_trigger_and_event(
        &self,
        trigger_uuid: &str,
        event_summary_uuid: &str,
    ) -> StoreResult<usize>;
    /// Entries with `flush_time <= now_ms`, earliest first.
    fn find_all_due(&self, now_ms: i64) -> StoreResult<Vec<SpoolEntry>>;
    fn update_flush_time(&self, uuid: &str, flush_time: i64) -> StoreResult<bool>;
    fn find_by_subscription_and_event(
        &self,
        subscription_uuid: &str,
        event_summary_uuid: &str,
    ) -> StoreResult<Option<SpoolEntry>>;
    fn find_all_by_event_summary(&self, event_summary_uuid: &str)
    -> StoreResult<Vec<SpoolEntry>>;
    /// Earliest flush time of any entry.
    fn next_flush_time(&self) -> StoreResult<Option<i64>>;
}

/// The four stores the processor and the spool pass share.
#[derive(Clone)]
pub struct Stores {
    pub triggers: Arc<dyn TriggerStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub events: Arc<dyn EventSummaryStore>,
    pub spool: Arc<dyn SpoolStore>,
}
