// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job status monitor: reconciles the printing subsystem's push notifications
// with the system's own persisted job record.
//
// Two feeds report on the same jobs:
//
//   push   the printer (or its spooler) reports state changes with its own
//          creation/completion timestamps;
//   store  the persisted path reports that it has committed the job.
//
// Notifications only update a table of `JobStatusRecord`s.  All work against
// collaborators (store lookups and writes, admin events, user messages,
// status pulls) happens in the background sweep, outside the table lock.
//
// Lifecycle of a record:
//
//   created on the first notification from either feed
//   -> dropped as an external job if the store never confirms it in time
//   -> reconciled against the active store entry on every sweep
//   -> dropped once its accepted state is finished (a finished job is no
//      longer in the printer's queue), or once the store has lost it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use proxyprint_bridge::traits::{
    AdminEventSink, PersistedJobStore, PrinterGateway, UserNotificationSink,
};
use proxyprint_core::config::MonitorConfig;
use proxyprint_core::error::{ProxyPrintError, Result};
use proxyprint_core::types::{
    ActiveJob, ExternalJobId, PrintJobSnapshot, PrintJobState, UserId, UserMessageKind,
};

use crate::retry::{RetryConfig, retry_lookup};

/// Topic of the admin events raised by the monitor.
pub const EVENT_TOPIC: &str = "proxy-print";

/// Job ids are unique per printer only.
type JobKey = (String, ExternalJobId);

/// Merged view of one job across both feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusRecord {
    pub printer: String,
    pub job_id: ExternalJobId,
    pub job_name: String,
    /// Last state pushed by the printing subsystem.
    pub push_state: Option<PrintJobState>,
    /// Last state reported by the persisted path.
    pub store_state: Option<PrintJobState>,
    /// Last state that went through change detection.
    pub accepted_state: Option<PrintJobState>,
    /// Epoch seconds.  Notifications without one are never tracked.
    pub created_at: i64,
    /// Epoch seconds, as reported.
    pub completed_at: Option<i64>,
    /// When either feed last refreshed the record.
    pub updated_at: Instant,
}

impl JobStatusRecord {
    fn new(snapshot: &PrintJobSnapshot, created_at: i64) -> Self {
        Self {
            printer: snapshot.printer.clone(),
            job_id: snapshot.job_id,
            job_name: snapshot.job_name.clone(),
            push_state: None,
            store_state: None,
            accepted_state: None,
            created_at,
            completed_at: None,
            updated_at: Instant::now(),
        }
    }

    /// The push state, or the store state while nothing was pushed yet.
    pub fn current_state(&self) -> Option<PrintJobState> {
        self.push_state.or(self.store_state)
    }
}

/// Which feed a notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Feed {
    Push,
    Store,
}

/// Counters for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Records whose state change was accepted.
    pub reconciled: u32,
    /// Records dropped as externally issued.
    pub external: u32,
    /// Records finalized through an alternate path.
    pub finalized_elsewhere: u32,
    /// Records dropped because the store lost them.
    pub lost: u32,
    /// Successful heartbeat pulls.
    pub pulled: u32,
    /// Failed or timed-out heartbeat pulls.
    pub pull_failures: u32,
}

impl SweepStats {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// A state change accepted by change detection, applied outside the lock.
struct AcceptedChange {
    previous: Option<PrintJobState>,
    state: PrintJobState,
    job_name: String,
    created_at: i64,
    completed_at: Option<i64>,
}

struct MonitorInner {
    config: MonitorConfig,
    retry: RetryConfig,
    gateway: Arc<dyn PrinterGateway>,
    store: Arc<dyn PersistedJobStore>,
    events: Arc<dyn AdminEventSink>,
    notifications: Arc<dyn UserNotificationSink>,
    records: Mutex<HashMap<JobKey, JobStatusRecord>>,
}

/// The job status reconciler.
///
/// One instance per process.  Notification entry points may be called from
/// any task; a single background worker runs the sweep between [`start`]
/// and [`stop`].
///
/// [`start`]: JobStatusMonitor::start
/// [`stop`]: JobStatusMonitor::stop
pub struct JobStatusMonitor {
    inner: Arc<MonitorInner>,
    /// Notification handle used to signal the sweep worker to exit.
    shutdown_signal: Arc<Notify>,
    /// Handle to the sweep worker while it runs.
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobStatusMonitor {
    pub fn new(
        config: MonitorConfig,
        gateway: Arc<dyn PrinterGateway>,
        store: Arc<dyn PersistedJobStore>,
        events: Arc<dyn AdminEventSink>,
        notifications: Arc<dyn UserNotificationSink>,
    ) -> Self {
        let retry = RetryConfig::fixed(config.lookup_attempts, config.lookup_delay());
        Self {
            inner: Arc::new(MonitorInner {
                config,
                retry,
                gateway,
                store,
                events,
                notifications,
                records: Mutex::new(HashMap::new()),
            }),
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: Mutex::new(None),
        }
    }

    /// State pushed by the printing subsystem.  Returns `false` when the
    /// notification was rejected.
    pub fn on_push_notification(&self, snapshot: PrintJobSnapshot) -> bool {
        self.inner.ingest(snapshot, Feed::Push)
    }

    /// State reported by the persisted path.  Returns `false` when the
    /// notification was rejected.
    pub fn on_store_notification(&self, snapshot: PrintJobSnapshot) -> bool {
        self.inner.ingest(snapshot, Feed::Store)
    }

    /// Run one sweep over the tracked records.
    pub async fn sweep_once(&self) -> SweepStats {
        self.inner.sweep_once().await
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.records().len()
    }

    /// A copy of the record for a job, if it is tracked.
    pub fn record(&self, printer: &str, job_id: ExternalJobId) -> Option<JobStatusRecord> {
        self.inner
            .records()
            .get(&(printer.to_string(), job_id))
            .cloned()
    }

    pub fn is_running(&self) -> bool {
        self.handle().is_some()
    }

    fn handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task_handle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawn the sweep worker.  Must be called within a Tokio runtime.
    pub fn start(&self) {
        let mut handle = self.handle();
        if handle.is_some() {
            debug!("job status monitor already running");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let shutdown = Arc::clone(&self.shutdown_signal);
        *handle = Some(tokio::spawn(async move {
            inner.sweep_loop(shutdown).await;
        }));
        info!(
            interval_ms = self.inner.config.sweep_interval_ms,
            "job status monitor started"
        );
    }

    /// Signal the sweep worker and wait until it has left its current
    /// iteration.
    pub async fn stop(&self) -> Result<()> {
        let Some(handle) = self.handle().take() else {
            return Ok(());
        };

        info!("stopping job status monitor");
        self.shutdown_signal.notify_one();

        let poll = self.inner.config.shutdown_poll();
        while !handle.is_finished() {
            tokio::time::sleep(poll).await;
        }
        handle
            .await
            .map_err(|e| ProxyPrintError::Worker(format!("sweep task join: {e}")))?;

        info!("job status monitor stopped");
        Ok(())
    }
}

impl MonitorInner {
    fn records(&self) -> MutexGuard<'_, HashMap<JobKey, JobStatusRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ingest(&self, snapshot: PrintJobSnapshot, feed: Feed) -> bool {
        let Some(created_at) = snapshot.created_at else {
            warn!(
                printer = %snapshot.printer,
                job_id = %snapshot.job_id,
                ?feed,
                "notification without creation time rejected"
            );
            return false;
        };

        let mut records = self.records();
        let record = records
            .entry((snapshot.printer.clone(), snapshot.job_id))
            .or_insert_with(|| JobStatusRecord::new(&snapshot, created_at));

        match feed {
            Feed::Push => record.push_state = Some(snapshot.state),
            Feed::Store => {
                record.store_state = Some(snapshot.state);
                // An unfinished committed state is the baseline for change
                // detection.  A finished one is resolved by the sweep.
                if !snapshot.state.is_finished() {
                    record.accepted_state.get_or_insert(snapshot.state);
                }
            }
        }
        if snapshot.completed_at.is_some() {
            record.completed_at = snapshot.completed_at;
        }
        if record.job_name.is_empty() {
            record.job_name = snapshot.job_name;
        }
        record.updated_at = Instant::now();

        debug!(
            printer = %record.printer,
            job_id = %record.job_id,
            ?feed,
            state = %snapshot.state,
            "notification accepted"
        );
        true
    }

    fn remove(&self, key: &JobKey) {
        self.records().remove(key);
    }

    async fn sweep_loop(self: Arc<Self>, shutdown: Arc<Notify>) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("sweep loop received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let stats = self.sweep_once().await;
                    if !stats.is_idle() {
                        debug!(?stats, "sweep finished");
                    }
                }
            }
        }
    }

    async fn sweep_once(&self) -> SweepStats {
        let keys: Vec<JobKey> = self.records().keys().cloned().collect();
        let mut stats = SweepStats::default();
        for key in keys {
            self.sweep_record(&key, &mut stats).await;
        }
        stats
    }

    #[instrument(skip(self, stats), fields(printer = %key.0, job_id = %key.1))]
    async fn sweep_record(&self, key: &JobKey, stats: &mut SweepStats) {
        let Some(mut record) = self.records().get(key).cloned() else {
            return;
        };

        if record.updated_at.elapsed() > self.config.heartbeat() {
            if !self.heartbeat_pull(key, stats).await {
                return;
            }
            match self.records().get(key).cloned() {
                Some(refreshed) => record = refreshed,
                None => return,
            }
        }

        if record.store_state.is_none() {
            let age = self.gateway.system_time() - record.created_at;
            if age > self.config.orphan_wait_secs as i64 {
                info!(
                    state = ?record.current_state(),
                    age_secs = age,
                    "external job not issued through proxy print, no longer tracked"
                );
                self.remove(key);
                stats.external += 1;
            }
            return;
        }

        let store = &self.store;
        let printer = record.printer.as_str();
        let job_id = record.job_id;

        if record.store_state.is_some_and(|state| state.is_finished()) {
            match store.find_finished_job(printer, job_id) {
                Ok(Some(finished)) => {
                    self.close_finished(key, &record, &finished, stats);
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("finished job lookup failed: {e}");
                    return;
                }
            }
        }

        let lookup = retry_lookup(&self.retry, move || async move {
            store.find_active_job(printer, job_id)
        })
        .await;

        match lookup {
            Ok(Some(active)) => self.reconcile(key, &active, stats),
            Ok(None) => match store.find_finished_job(printer, job_id) {
                Ok(Some(finished)) => self.close_finished(key, &record, &finished, stats),
                Ok(None) => self.resolve_missing(key, stats),
                Err(e) => error!("finished job lookup failed: {e}"),
            },
            Err(e) => error!("active job lookup failed: {e}"),
        }
    }

    /// Pull the job from the printer and fold the answer in as a push
    /// notification.  Returns `false` when the pull failed.
    async fn heartbeat_pull(&self, key: &JobKey, stats: &mut SweepStats) -> bool {
        let (printer, job_id) = (key.0.as_str(), key.1);
        let pulled = tokio::time::timeout(
            self.config.pull_timeout(),
            self.gateway.retrieve_print_job(printer, job_id),
        )
        .await
        .unwrap_or(Err(ProxyPrintError::GatewayTimeout));

        match pulled {
            Ok(Some(snapshot)) => {
                debug!(state = %snapshot.state, "heartbeat pull");
                self.ingest(snapshot, Feed::Push);
            }
            Ok(None) => debug!("heartbeat pull: job unknown to printer"),
            Err(e) => {
                warn!("heartbeat pull failed: {e}");
                stats.pull_failures += 1;
                return false;
            }
        }

        if let Some(record) = self.records().get_mut(key) {
            record.updated_at = Instant::now();
        }
        stats.pulled += 1;
        true
    }

    /// The store no longer has the job as active: either an alternate path
    /// finalized it or it is lost.
    fn resolve_missing(&self, key: &JobKey, stats: &mut SweepStats) {
        let (printer, job_id) = (key.0.as_str(), key.1);
        match self.store.find_finalized_job_alternate_path(printer, job_id) {
            Ok(Some(finalized)) => {
                info!(
                    finalized_by = %finalized.finalized_by,
                    state = %finalized.state,
                    "job finalized by alternate path"
                );
                if let Some(user) = finalized.user_id {
                    self.notify_user(user, finalized.completed_at, finalized.state);
                }
                self.remove(key);
                stats.finalized_elsewhere += 1;
            }
            Ok(None) => {
                error!(
                    attempts = self.retry.attempts(),
                    "active job not found after {} retries with backoff",
                    self.retry.attempts()
                );
                self.remove(key);
                stats.lost += 1;
            }
            Err(e) => error!("alternate path lookup failed: {e}"),
        }
    }

    /// The store already holds the job as finished, so there is nothing to
    /// write back.  Announce the final state and stop tracking.
    fn close_finished(
        &self,
        key: &JobKey,
        record: &JobStatusRecord,
        finished: &ActiveJob,
        stats: &mut SweepStats,
    ) {
        let (printer, job_id) = (key.0.as_str(), key.1);
        let state = finished.state;
        let job_name = if record.job_name.is_empty() {
            finished.job_name.as_str()
        } else {
            record.job_name.as_str()
        };
        self.publish_state(printer, job_id, job_name, state);

        if let Some(user) = finished.user_id {
            let completed_at = self.plausible_completion(
                finished.completed_at.or(record.completed_at),
                finished.created_at,
            );
            self.notify_user(user, completed_at, state);
        }

        info!(%state, "job already finished in store, no longer tracked");
        self.remove(key);
        stats.reconciled += 1;
    }

    fn publish_state(
        &self,
        printer: &str,
        job_id: ExternalJobId,
        job_name: &str,
        state: PrintJobState,
    ) {
        self.events.publish(
            EVENT_TOPIC,
            state.event_severity(),
            &format!("Job {job_id} \"{job_name}\" on printer {printer}: {state}"),
        );
    }

    fn reconcile(&self, key: &JobKey, active: &ActiveJob, stats: &mut SweepStats) {
        let change = {
            let mut records = self.records();
            let Some(record) = records.get_mut(key) else {
                return;
            };
            let Some(state) = record.current_state() else {
                return;
            };
            if record.accepted_state == Some(state) {
                None
            } else {
                let previous = record.accepted_state.replace(state);
                Some(AcceptedChange {
                    previous,
                    state,
                    job_name: record.job_name.clone(),
                    created_at: record.created_at,
                    completed_at: record.completed_at,
                })
            }
        };

        let Some(change) = change else {
            return;
        };
        let (printer, job_id) = (key.0.as_str(), key.1);
        let state = change.state;

        let completed_at = state
            .is_finished()
            .then(|| self.plausible_completion(change.completed_at, change.created_at));

        let job_name = if change.job_name.is_empty() {
            active.job_name.as_str()
        } else {
            change.job_name.as_str()
        };
        self.publish_state(printer, job_id, job_name, state);

        if let Err(e) = self
            .store
            .update_job_status(printer, job_id, state, completed_at)
        {
            error!(%state, "job status update failed: {e}");
            // Leave the change pending so the next sweep writes it again.
            if let Some(record) = self.records().get_mut(key) {
                if record.accepted_state == Some(state) {
                    record.accepted_state = change.previous;
                }
            }
            return;
        }
        stats.reconciled += 1;

        if let (Some(user), Some(completed_at)) = (active.user_id, completed_at) {
            if completed_at != 0 {
                self.notify_user(user, completed_at, state);
            }
        }

        if state.is_finished() {
            debug!(%state, "finished job no longer tracked");
            self.remove(key);
        }
    }

    /// A reported completion time, or the gateway's "now" when the report is
    /// missing, zero, in the future, or before the job was created.
    fn plausible_completion(&self, reported: Option<i64>, created_at: i64) -> i64 {
        let now = self.gateway.system_time();
        match reported {
            Some(t) if t != 0 && t <= now && t >= created_at => t,
            _ => {
                warn!(
                    ?reported,
                    created_at,
                    corrected = now,
                    "implausible completion time corrected"
                );
                now
            }
        }
    }

    fn notify_user(&self, user: UserId, timestamp: i64, state: PrintJobState) {
        if let Err(e) = self
            .notifications
            .write(user, timestamp, UserMessageKind::for_state(state))
        {
            warn!(%user, "user notification failed: {e}");
        }
    }
}
