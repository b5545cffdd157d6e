//! Per-tenant periodic polling.
//!
//! A [`PollScheduler`] owns one timer loop. Every tick is spawned as its own
//! task so a slow endpoint never delays the timer, and a per-scheduler flag
//! guarantees at most one tick is in flight: a tick that fires while the
//! previous one is still running is skipped (and counted), never queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use invsync_core::TenantId;
use invsync_events::{QueueEntry, QueueError, WorkQueue};
use serde_json::Value as JsonValue;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::adapter::Adapter;
use crate::fetch::RecordFetcher;
use crate::retry::RetryExecutor;
use crate::transform::Transform;

/// Upper bound on one record's enqueue. A queue that stops answering fails
/// the record instead of holding the tick open.
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of a scheduler. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Point-in-time counters of one scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SchedulerStats {
    pub ticks_started: u64,
    pub ticks_skipped: u64,
    /// Ticks whose fetch failed after all retries.
    pub ticks_failed: u64,
    pub records_enqueued: u64,
    pub enqueue_failures: u64,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    ticks_started: AtomicU64,
    ticks_skipped: AtomicU64,
    ticks_failed: AtomicU64,
    records_enqueued: AtomicU64,
    enqueue_failures: AtomicU64,
    last_success_at: Mutex<Option<DateTime<Utc>>>,
}

/// Everything a tick needs, shared between the timer loop and tick tasks.
struct TickContext {
    tenant: TenantId,
    queue_name: String,
    fetcher: Arc<dyn RecordFetcher>,
    queue: Arc<dyn WorkQueue>,
    retry: RetryExecutor,
    transform: Option<Transform>,
    adapter: Adapter,
    enqueue_timeout: Duration,
    in_progress: AtomicBool,
    counters: Counters,
}

/// Clears the in-progress flag when the tick ends, even by panic.
struct InProgressGuard(Arc<TickContext>);

impl Drop for InProgressGuard {
    fn drop(&mut self) {
        self.0.in_progress.store(false, Ordering::Release);
    }
}

impl TickContext {
    fn trigger(self: &Arc<Self>) {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.counters.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            warn!(tenant = %self.tenant, "previous tick still running, skipping this one");
            return;
        }

        self.counters.ticks_started.fetch_add(1, Ordering::Relaxed);
        let guard = InProgressGuard(Arc::clone(self));
        tokio::spawn(async move {
            guard.0.run_tick().await;
            drop(guard);
        });
    }

    async fn run_tick(&self) {
        debug!(tenant = %self.tenant, "poll tick started");

        let records = match self.retry.execute(|| self.fetcher.fetch()).await {
            Ok(records) => records,
            Err(e) => {
                self.counters.ticks_failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    tenant = %self.tenant,
                    max_retries = self.retry.max_retries(),
                    error = %e,
                    "polling fetch failed after retries, skipping tick"
                );
                return;
            }
        };

        let total = records.len();
        let mut enqueued = 0usize;
        for raw in records {
            match self.process_record(raw).await {
                Ok(()) => enqueued += 1,
                Err(e) => {
                    self.counters.enqueue_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        tenant = %self.tenant,
                        queue = %self.queue_name,
                        error = %e,
                        "failed to enqueue record"
                    );
                }
            }
        }

        self.counters
            .records_enqueued
            .fetch_add(enqueued as u64, Ordering::Relaxed);
        if enqueued > 0 || total == 0 {
            if let Ok(mut last) = self.counters.last_success_at.lock() {
                *last = Some(Utc::now());
            }
        }

        info!(
            tenant = %self.tenant,
            queue = %self.queue_name,
            fetched = total,
            enqueued,
            "poll tick finished"
        );
    }

    async fn process_record(&self, raw: JsonValue) -> Result<(), QueueError> {
        let raw = match &self.transform {
            Some(transform) => transform.apply(raw),
            None => raw,
        };
        let record = self.adapter.normalize(&raw);
        let entry = QueueEntry::encode(&record)?;
        match tokio::time::timeout(self.enqueue_timeout, self.queue.enqueue(&self.queue_name, entry)).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::Unavailable(format!(
                "enqueue did not finish within {:?}",
                self.enqueue_timeout
            ))),
        }
    }

    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            ticks_started: self.counters.ticks_started.load(Ordering::Relaxed),
            ticks_skipped: self.counters.ticks_skipped.load(Ordering::Relaxed),
            ticks_failed: self.counters.ticks_failed.load(Ordering::Relaxed),
            records_enqueued: self.counters.records_enqueued.load(Ordering::Relaxed),
            enqueue_failures: self.counters.enqueue_failures.load(Ordering::Relaxed),
            last_success_at: self.counters.last_success_at.lock().ok().and_then(|last| *last),
        }
    }
}

/// Periodically fetches a tenant's records, normalizes them and enqueues
/// each one on the tenant's queue.
///
/// `start` must be called from within a Tokio runtime. The first tick fires
/// one interval after `start`. `stop` ends the timer loop but lets an
/// in-flight tick finish.
pub struct PollScheduler {
    interval: Duration,
    ctx: Arc<TickContext>,
    state: Mutex<SchedulerState>,
    shutdown: Arc<Notify>,
}

/// Builds a [`PollScheduler`]. Defaults: no transform, the identity adapter,
/// the default retry executor and [`DEFAULT_ENQUEUE_TIMEOUT`].
pub struct PollSchedulerBuilder {
    tenant: TenantId,
    queue_name: String,
    interval: Duration,
    fetcher: Arc<dyn RecordFetcher>,
    queue: Arc<dyn WorkQueue>,
    retry: RetryExecutor,
    transform: Option<Transform>,
    adapter: Adapter,
    enqueue_timeout: Duration,
}

impl PollSchedulerBuilder {
    pub fn retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn transform(mut self, transform: Option<Transform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn adapter(mut self, adapter: Adapter) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    pub fn build(self) -> PollScheduler {
        PollScheduler {
            interval: self.interval,
            ctx: Arc::new(TickContext {
                tenant: self.tenant,
                queue_name: self.queue_name,
                fetcher: self.fetcher,
                queue: self.queue,
                retry: self.retry,
                transform: self.transform,
                adapter: self.adapter,
                enqueue_timeout: self.enqueue_timeout,
                in_progress: AtomicBool::new(false),
                counters: Counters::default(),
            }),
            state: Mutex::new(SchedulerState::Idle),
            shutdown: Arc::new(Notify::new()),
        }
    }
}

impl PollScheduler {
    pub fn builder(
        tenant: TenantId,
        queue_name: impl Into<String>,
        interval: Duration,
        fetcher: Arc<dyn RecordFetcher>,
        queue: Arc<dyn WorkQueue>,
    ) -> PollSchedulerBuilder {
        PollSchedulerBuilder {
            tenant,
            queue_name: queue_name.into(),
            interval,
            fetcher,
            queue,
            retry: RetryExecutor::default(),
            transform: None,
            adapter: Adapter::Identity,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }

    pub fn new(
        tenant: TenantId,
        queue_name: impl Into<String>,
        interval: Duration,
        fetcher: Arc<dyn RecordFetcher>,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self::builder(tenant, queue_name, interval, fetcher, queue).build()
    }

    pub fn tenant(&self) -> &TenantId {
        &self.ctx.tenant
    }

    pub fn queue_name(&self) -> &str {
        &self.ctx.queue_name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        self.state.lock().map(|s| *s).unwrap_or(SchedulerState::Stopped)
    }

    pub fn stats(&self) -> SchedulerStats {
        self.ctx.snapshot()
    }

    /// Begin ticking. A no-op while running; ignored once stopped.
    pub fn start(&self) {
        let Ok(mut state) = self.state.lock() else {
            error!(tenant = %self.ctx.tenant, "scheduler state lock poisoned, not starting");
            return;
        };

        match *state {
            SchedulerState::Running => {
                debug!(tenant = %self.ctx.tenant, "scheduler already running");
            }
            SchedulerState::Stopped => {
                warn!(tenant = %self.ctx.tenant, "start() on a stopped scheduler ignored");
            }
            SchedulerState::Idle => {
                *state = SchedulerState::Running;
                tokio::spawn(timer_loop(
                    Arc::clone(&self.ctx),
                    self.interval,
                    Arc::clone(&self.shutdown),
                ));
                info!(
                    tenant = %self.ctx.tenant,
                    queue = %self.ctx.queue_name,
                    interval_ms = self.interval.as_millis() as u64,
                    "poll scheduler started"
                );
            }
        }
    }

    /// Stop ticking. Idempotent.
    pub fn stop(&self) {
        let previous = match self.state.lock() {
            Ok(mut state) => std::mem::replace(&mut *state, SchedulerState::Stopped),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), SchedulerState::Stopped),
        };

        if previous == SchedulerState::Running {
            self.shutdown.notify_one();
            info!(tenant = %self.ctx.tenant, "poll scheduler stopped");
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl core::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("tenant", &self.ctx.tenant)
            .field("queue_name", &self.ctx.queue_name)
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn timer_loop(ctx: Arc<TickContext>, period: Duration, shutdown: Arc<Notify>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = ticker.tick() => ctx.trigger(),
        }
    }

    debug!(tenant = %ctx.tenant, "poll timer loop exited");
}
