mod bootstrap;
mod signal;

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use orion_error::op_context;
use orion_error::prelude::*;
use sig_config::SignalConfig;
use sig_core::clock::{Clock, SystemClock};
use sig_core::error::CoreResult;
use sig_core::model::EventSummary;
use sig_core::rule::RuleEvaluator;
use sig_core::signal::{SignalDispatcher, SignalPublisher};
use sig_core::spool::{SpoolProcessor, SpoolWaker};
use sig_core::store::Stores;
use sig_core::trigger::{EventOutcome, TriggerProcessor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::scheduler::SpoolScheduler;

pub use bootstrap::load_triggers;
pub use signal::wait_for_signal;

// ---------------------------------------------------------------------------
// SchedulerHandle
// ---------------------------------------------------------------------------

/// A running [`SpoolScheduler`] task.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    waker: Arc<SpoolWaker>,
    generation: u64,
}

impl SchedulerHandle {
    /// Spawn `scheduler` on the current runtime. `waker` is reopened here and
    /// closed again by [`stop`](Self::stop), unless a newer scheduler has
    /// reopened it since.
    pub fn spawn(scheduler: SpoolScheduler, waker: Arc<SpoolWaker>, cancel: CancellationToken) -> Self {
        let generation = waker.reopen();
        let task = tokio::spawn(scheduler.run(cancel.clone()));
        Self {
            cancel,
            task: Mutex::new(Some(task)),
            waker,
            generation,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Cancel the loop and wait for it to exit. Later calls return at once.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(task) = task else {
            return Ok(());
        };
        self.waker.close_generation(self.generation);
        self.cancel.cancel();
        task.await.map_err(|e| {
            StructError::from(RuntimeReason::Shutdown)
                .with_detail(format!("scheduler join error: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// TriggerService
// ---------------------------------------------------------------------------

/// The trigger subsystem for one process: event processing plus the spool
/// scheduler, sharing one set of stores.
pub struct TriggerService {
    processor: Arc<TriggerProcessor>,
    spool: Arc<SpoolProcessor>,
    waker: Arc<SpoolWaker>,
    clock: Arc<dyn Clock>,
    max_poll: Duration,
    scheduler: Mutex<Option<Arc<SchedulerHandle>>>,
}

impl TriggerService {
    /// Build the service from configuration. Publishers are opened from
    /// `publish.sinks`; relative paths are resolved against `base_dir`.
    #[tracing::instrument(name = "service.bootstrap", skip_all, fields(base_dir = %base_dir.display()))]
    pub fn bootstrap(config: &SignalConfig, base_dir: &Path, stores: Stores) -> RuntimeResult<Self> {
        let mut op = op_context!("trigger-service-bootstrap").with_auto_log();
        op.record("sinks", config.publish.sinks.len().to_string().as_str());

        let publisher = bootstrap::build_publisher(config, base_dir)?;
        let service = Self::with_parts(
            stores,
            publisher,
            Arc::new(RuleEvaluator::with_capacity(config.rules.cache_capacity)),
            Arc::new(SystemClock),
            config.scheduler.max_poll_interval.as_duration(),
        );
        sig_info!(sys,
            sinks = config.publish.sinks.len(),
            cache_capacity = config.rules.cache_capacity,
            max_poll = %config.scheduler.max_poll_interval,
            "trigger service ready"
        );
        op.mark_suc();
        Ok(service)
    }

    pub fn with_parts(
        stores: Stores,
        publisher: Arc<dyn SignalPublisher>,
        evaluator: Arc<RuleEvaluator>,
        clock: Arc<dyn Clock>,
        max_poll: Duration,
    ) -> Self {
        let waker = Arc::new(SpoolWaker::new());
        waker.close();
        let dispatcher = Arc::new(SignalDispatcher::new(publisher, stores.events.clone()));
        let processor = TriggerProcessor::new(stores.clone(), evaluator, dispatcher.clone())
            .with_clock(clock.clone())
            .with_waker(waker.clone());
        Self {
            processor: Arc::new(processor),
            spool: Arc::new(SpoolProcessor::new(stores, dispatcher).with_retry_delay(max_poll)),
            waker,
            clock,
            max_poll,
            scheduler: Mutex::new(None),
        }
    }

    pub fn processor(&self) -> &Arc<TriggerProcessor> {
        &self.processor
    }

    pub fn on_event(&self, summary: &EventSummary) -> CoreResult<EventOutcome> {
        self.processor.on_event(summary)
    }

    /// Start the spool scheduler unless it is already running.
    pub fn start(&self, cancel: CancellationToken) -> Arc<SchedulerHandle> {
        let mut slot = self.scheduler.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref()
            && handle.is_running()
        {
            sig_debug!(sys, "spool scheduler already running");
            return handle.clone();
        }
        let scheduler = SpoolScheduler::new(
            self.spool.clone(),
            self.waker.clone(),
            self.clock.clone(),
            self.max_poll,
        );
        let handle = Arc::new(SchedulerHandle::spawn(scheduler, self.waker.clone(), cancel));
        *slot = Some(handle.clone());
        handle
    }

    /// Stop the scheduler if one was started. Safe to call repeatedly.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| h.is_running())
    }
}
