//! In-process store implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::model::{EventSummary, SpoolEntry, Subscription, Trigger};

use super::{
    EventSummaryStore, SpoolInsert, SpoolStore, StoreResult, Stores, SubscriptionStore,
    TriggerStore,
};

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Concrete in-memory stores, wired together.
#[derive(Clone)]
pub struct MemoryStores {
    pub triggers: Arc<MemoryTriggerStore>,
    pub events: Arc<MemoryEventStore>,
    pub spool: Arc<MemorySpoolStore>,
}

impl MemoryStores {
    pub fn new(triggers: MemoryTriggerStore) -> Self {
        let triggers = Arc::new(triggers);
        let spool = Arc::new(MemorySpoolStore::new(triggers.clone()));
        Self {
            triggers,
            events: Arc::new(MemoryEventStore::new()),
            spool,
        }
    }

    pub fn stores(&self) -> Stores {
        Stores {
            triggers: self.triggers.clone(),
            subscriptions: self.triggers.clone(),
            events: self.events.clone(),
            spool: self.spool.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Triggers (and their subscriptions)
// ---------------------------------------------------------------------------

/// Triggers keyed by uuid. Also answers subscription lookups, since every
/// subscription is owned by exactly one trigger.
#[derive(Default)]
pub struct MemoryTriggerStore {
    triggers: RwLock<BTreeMap<String, Trigger>>,
}

impl MemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_triggers(triggers: impl IntoIterator<Item = Trigger>) -> Self {
        let store = Self::new();
        for t in triggers {
            store.upsert(t);
        }
        store
    }

    pub fn upsert(&self, trigger: Trigger) {
        self.triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(trigger.uuid.clone(), trigger);
    }

    pub fn remove(&self, uuid: &str) -> Option<Trigger> {
        self.triggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uuid)
    }

    /// Returns false if no such trigger exists.
    pub fn set_enabled(&self, uuid: &str, enabled: bool) -> bool {
        let mut guard = self.triggers.write().unwrap_or_else(PoisonError::into_inner);
        match guard.get_mut(uuid) {
            Some(t) => {
                t.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.triggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TriggerStore for MemoryTriggerStore {
    fn find_all_enabled_with_subscriptions(&self) -> StoreResult<Vec<Trigger>> {
        let guard = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .values()
            .filter(|t| t.enabled && !t.subscriptions.is_empty())
            .cloned()
            .collect())
    }

    fn find_by_uuid(&self, uuid: &str) -> StoreResult<Option<Trigger>> {
        let guard = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(uuid).cloned())
    }
}

impl SubscriptionStore for MemoryTriggerStore {
    fn find_by_uuid(&self, uuid: &str) -> StoreResult<Option<Subscription>> {
        let guard = self.triggers.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard
            .values()
            .flat_map(|t| t.subscriptions.iter())
            .find(|s| s.uuid == uuid)
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// Event summaries
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<String, EventSummary>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, summary: EventSummary) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(summary.uuid.clone(), summary);
    }

    pub fn remove(&self, uuid: &str) -> Option<EventSummary> {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uuid)
    }
}

impl EventSummaryStore for MemoryEventStore {
    fn find_by_uuid(&self, uuid: &str) -> StoreResult<Option<EventSummary>> {
        let guard = self.events.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(uuid).cloned())
    }
}

// ---------------------------------------------------------------------------
// Spool
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SpoolTable {
    rows: HashMap<String, SpoolEntry>,
    /// (subscription_uuid, event_summary_uuid) → row uuid
    by_pair: HashMap<(String, String), String>,
}

impl SpoolTable {
    fn remove(&mut self, uuid: &str) -> Option<SpoolEntry> {
        let row = self.rows.remove(uuid)?;
        self.by_pair.remove(&(
            row.subscription_uuid.clone(),
            row.event_summary_uuid.clone(),
        ));
        Some(row)
    }
}

/// Spool rows guarded by one mutex, so insert-if-absent is atomic.
///
/// Deleting by trigger resolves each row's subscription through the
/// subscription store, the way a relational store would join on it.
pub struct MemorySpoolStore {
    table: Mutex<SpoolTable>,
    subscriptions: Arc<dyn SubscriptionStore>,
}

impl MemorySpoolStore {
    pub fn new(subscriptions: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            table: Mutex::new(SpoolTable::default()),
            subscriptions,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all rows, earliest flush first.
    pub fn entries(&self) -> Vec<SpoolEntry> {
        let mut rows: Vec<SpoolEntry> = self.lock().rows.values().cloned().collect();
        rows.sort_by(|a, b| a.flush_time.cmp(&b.flush_time).then(a.uuid.cmp(&b.uuid)));
        rows
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SpoolTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpoolStore for MemorySpoolStore {
    fn create(&self, entry: &SpoolEntry) -> StoreResult<SpoolInsert> {
        let mut table = self.lock();
        let key = (
            entry.subscription_uuid.clone(),
            entry.event_summary_uuid.clone(),
        );
        if let Some(existing) = table.by_pair.get(&key) {
            return Ok(SpoolInsert::Existing(existing.clone()));
        }
        table.by_pair.insert(key, entry.uuid.clone());
        table.rows.insert(entry.uuid.clone(), entry.clone());
        Ok(SpoolInsert::Created(entry.uuid.clone()))
    }

    fn delete(&self, uuid: &str) -> StoreResult<bool> {
        Ok(self.lock().remove(uuid).is_some())
    }

    fn delete_by_trigger_and_event(
        &self,
        trigger_uuid: &str,
        event_summary_uuid: &str,
    ) -> StoreResult<usize> {
        let candidates: Vec<(String, String)> = self
            .lock()
            .rows
            .values()
            .filter(|r| r.event_summary_uuid == event_summary_uuid)
            .map(|r| (r.uuid.clone(), r.subscription_uuid.clone()))
            .collect();

        let mut removed = 0;
        for (row_uuid, sub_uuid) in candidates {
            let owned = self
                .subscriptions
                .find_by_uuid(&sub_uuid)?
                .is_some_and(|s| s.trigger_uuid == trigger_uuid);
            if owned && self.lock().remove(&row_uuid).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn find_all_due(&self, now_ms: i64) -> StoreResult<Vec<SpoolEntry>> {
        let mut due: Vec<SpoolEntry> = self
            .lock()
            .rows
            .values()
            .filter(|r| r.is_due(now_ms))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.flush_time.cmp(&b.flush_time).then(a.uuid.cmp(&b.uuid)));
        Ok(due)
    }

    fn update_flush_time(&self, uuid: &str, flush_time: i64) -> StoreResult<bool> {
        let mut table = self.lock();
        match table.rows.get_mut(uuid) {
            Some(row) => {
                row.flush_time = flush_time;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn find_by_subscription_and_event(
        &self,
        subscription_uuid: &str,
        event_summary_uuid: &str,
    ) -> StoreResult<Option<SpoolEntry>> {
        let table = self.lock();
        let key = (subscription_uuid.to_string(), event_summary_uuid.to_string());
        Ok(table
            .by_pair
            .get(&key)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    fn find_all_by_event_summary(
        &self,
        event_summary_uuid: &str,
    ) -> StoreResult<Vec<SpoolEntry>> {
        Ok(self
            .lock()
            .rows
            .values()
            .filter(|r| r.event_summary_uuid == event_summary_uuid)
            .cloned()
            .collect())
    }

    fn next_flush_time(&self) -> StoreResult<Option<i64>> {
        Ok(self.lock().rows.values().map(|r| r.flush_time).min())
    }
}
