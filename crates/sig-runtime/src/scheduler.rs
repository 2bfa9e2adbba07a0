use std::sync::Arc;
use std::time::Duration;

use sig_core::clock::Clock;
use sig_core::spool::{SpoolProcessor, SpoolWaker};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Drives [`SpoolProcessor::process_due`] at the right moments.
///
/// The next pass is due at the earliest of: `max_poll` from now, the
/// smallest repeat interval fired by the previous pass, the earliest flush
/// time in the store, and the earliest flush time reported through the
/// waker since the last pass.
pub struct SpoolScheduler {
    processor: Arc<SpoolProcessor>,
    waker: Arc<SpoolWaker>,
    clock: Arc<dyn Clock>,
    max_poll: Duration,
}

impl SpoolScheduler {
    pub fn new(
        processor: Arc<SpoolProcessor>,
        waker: Arc<SpoolWaker>,
        clock: Arc<dyn Clock>,
        max_poll: Duration,
    ) -> Self {
        Self {
            processor,
            waker,
            clock,
            max_poll,
        }
    }

    /// Run passes until `cancel` fires. A pass already running completes.
    #[tracing::instrument(name = "scheduler", skip_all, fields(max_poll = ?self.max_poll))]
    pub async fn run(self, cancel: CancellationToken) {
        sig_info!(sys, "spool scheduler started");
        let mut min_repeat: Option<Duration> = None;
        let mut backoff = false;

        loop {
            let now = self.clock.now_ms();
            let mut deadline = if backoff {
                now.saturating_add(millis(self.max_poll))
            } else {
                self.next_deadline(now, min_repeat)
            };
            let sleep = tokio::time::sleep_until(self.instant_at(deadline));
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        sig_info!(sys, "spool scheduler stopped");
                        return;
                    }
                    _ = &mut sleep => break,
                    _ = self.waker.notified() => {
                        if let Some(t) = self.waker.take_earliest()
                            && t < deadline
                        {
                            sig_trace!(pipe, flush_time = t, "scheduler deadline lowered");
                            deadline = t;
                            sleep.as_mut().reset(self.instant_at(t));
                        }
                    }
                }
            }

            let pass_at = self.clock.now_ms();
            match self.processor.process_due(pass_at) {
                Ok(pass) => {
                    min_repeat = pass.min_repeat;
                    backoff = false;
                }
                Err(e) => {
                    sig_warn!(pipe, error = %e, retry_in = ?self.max_poll, "spool pass failed");
                    min_repeat = None;
                    backoff = true;
                }
            }
        }
    }

    fn next_deadline(&self, now: i64, min_repeat: Option<Duration>) -> i64 {
        let mut deadline = now.saturating_add(millis(self.max_poll));
        if let Some(repeat) = min_repeat {
            deadline = deadline.min(now.saturating_add(millis(repeat)));
        }
        match self.processor.next_flush_time() {
            Ok(Some(t)) => deadline = deadline.min(t),
            Ok(None) => {}
            Err(e) => sig_warn!(pipe, error = %e, "next flush time unavailable"),
        }
        if let Some(t) = self.waker.take_earliest() {
            deadline = deadline.min(t);
        }
        deadline
    }

    fn instant_at(&self, deadline_ms: i64) -> Instant {
        let wait = deadline_ms.saturating_sub(self.clock.now_ms()).max(0);
        Instant::now() + Duration::from_millis(wait as u64)
    }
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}
