// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer.  Opens the stores, builds the release coordinator
// and the job status monitor from the persisted configuration, and exposes
// the operations the daemon's front ends call.
//
// The SQLite-backed stores serialize access internally, so every component
// is shared as a plain `Arc` and the struct clones cheaply into tasks.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, info, warn};

use proxyprint_bridge::traits::{
    AdminEventSink, BillingAdapter, CredentialResolver, PersistedJobStore, PrinterGateway,
    ReaderEventSource, UserNotificationSink,
};
use proxyprint_bridge::{OfflineBilling, OfflineGateway, ReaderEventHub};
use proxyprint_core::ProxyPrintConfig;
use proxyprint_core::error::Result;
use proxyprint_core::types::{ActiveJob, PrintJobSnapshot, ReaderEvent, UserId, UserIdentity};
use proxyprint_print::billing::{BilledJob, SettlementReport, SettlementRequest};
use proxyprint_print::chunk::{ChunkPlan, DocumentSelection};
use proxyprint_print::{
    BillingSettlement, ChunkPlanner, ExternalCompletionCheck, JobStatusMonitor,
    PrinterMediaSources, SqliteJobStore, UserMessageWriter,
};
use proxyprint_security::audit::AdminEvent;
use proxyprint_security::{AdminEventLog, AuthManager, AuthRequest, CardRegistry};

use super::data_dir;

/// Shared proxy-print services.
///
/// All fields are `Arc`-wrapped so the struct can be moved into tasks
/// without lifetime issues.
#[derive(Clone)]
pub struct ProxyPrintServices {
    config: Arc<Mutex<ProxyPrintConfig>>,
    data_dir: PathBuf,
    gateway: Arc<dyn PrinterGateway>,
    store: Arc<SqliteJobStore>,
    events: Arc<AdminEventLog>,
    messages: Arc<UserMessageWriter>,
    readers: Arc<ReaderEventHub>,
    cards: Arc<CardRegistry>,
    auth: Arc<AuthManager>,
    monitor: Arc<JobStatusMonitor>,
    settlement: Arc<BillingSettlement>,
    completion: Arc<ExternalCompletionCheck>,
}

#[allow(dead_code)]
impl ProxyPrintServices {
    /// Initialise all services from the default data directory.  Call once
    /// at startup.
    pub fn init() -> Result<Self> {
        Self::open(data_dir::data_dir())
    }

    /// Initialise all services with persistent stores below `dir`.
    pub fn open(dir: PathBuf) -> Result<Self> {
        info!(path = %dir.display(), "initialising proxy-print services");
        std::fs::create_dir_all(&dir)?;

        let config = ProxyPrintConfig::load_or_default(&dir);
        let store = SqliteJobStore::open(data_dir::resolve(&dir, &config.store_file))?;
        let events = AdminEventLog::open(data_dir::resolve(&dir, &config.event_log_file))?;
        let messages = UserMessageWriter::new(data_dir::resolve(&dir, &config.messages_dir));

        let services = Self::assemble(
            config,
            dir,
            store,
            events,
            messages,
            Arc::new(OfflineGateway),
            Arc::new(OfflineBilling),
        );
        info!("proxy-print services initialised");
        Ok(services)
    }

    /// In-memory stores, for when the data directory cannot be used.  User
    /// messages go to the system temp directory.
    pub fn fallback() -> Result<Self> {
        let dir = std::env::temp_dir().join("proxyprint");
        warn!(path = %dir.display(), "using in-memory stores");

        let config = ProxyPrintConfig::default();
        let messages = UserMessageWriter::new(dir.join(&config.messages_dir));
        Ok(Self::assemble(
            config,
            dir,
            SqliteJobStore::open_in_memory()?,
            AdminEventLog::open_in_memory()?,
            messages,
            Arc::new(OfflineGateway),
            Arc::new(OfflineBilling),
        ))
    }

    fn assemble(
        config: ProxyPrintConfig,
        data_dir: PathBuf,
        store: SqliteJobStore,
        events: AdminEventLog,
        messages: UserMessageWriter,
        gateway: Arc<dyn PrinterGateway>,
        billing: Arc<dyn BillingAdapter>,
    ) -> Self {
        let store = Arc::new(store);
        let events = Arc::new(events);
        let messages = Arc::new(messages);
        let readers = Arc::new(ReaderEventHub::new());
        let cards = Arc::new(CardRegistry::new());

        let auth = AuthManager::new(
            config.auth.expiry(),
            Arc::clone(&readers) as Arc<dyn ReaderEventSource>,
            Arc::clone(&cards) as Arc<dyn CredentialResolver>,
        );
        let monitor = JobStatusMonitor::new(
            config.monitor.clone(),
            Arc::clone(&gateway),
            Arc::clone(&store) as Arc<dyn PersistedJobStore>,
            Arc::clone(&events) as Arc<dyn AdminEventSink>,
            Arc::clone(&messages) as Arc<dyn UserNotificationSink>,
        );

        Self {
            config: Arc::new(Mutex::new(config)),
            data_dir,
            gateway,
            store,
            events,
            messages,
            readers,
            cards,
            auth: Arc::new(auth),
            monitor: Arc::new(monitor),
            settlement: Arc::new(BillingSettlement::new(Arc::clone(&billing))),
            completion: Arc::new(ExternalCompletionCheck::new(billing)),
        }
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Start the background sweep of the job status monitor.
    pub fn start(&self) {
        self.monitor.start();
    }

    /// Stop background work and wait for it to exit.
    pub async fn shutdown(&self) -> Result<()> {
        self.monitor.stop().await?;
        let dropped = self.auth.prune_expired();
        info!(dropped, "proxy-print services shut down");
        Ok(())
    }

    pub fn monitor(&self) -> &JobStatusMonitor {
        &self.monitor
    }

    pub fn store(&self) -> &SqliteJobStore {
        &self.store
    }

    pub fn messages(&self) -> &UserMessageWriter {
        &self.messages
    }

    // -- Planning ------------------------------------------------------------

    /// Cut a selection into printer submissions, assigning trays when the
    /// target printer's media sources are known.
    pub fn plan_print(
        &self,
        selection: &DocumentSelection,
        sources: Option<PrinterMediaSources>,
    ) -> Result<ChunkPlan> {
        let planner = match sources {
            Some(sources) => ChunkPlanner::new().with_media_sources(sources),
            None => ChunkPlanner::new(),
        };
        planner.plan_selection(selection)
    }

    // -- Job status ----------------------------------------------------------

    /// Persist a job just issued to a printer and start tracking it.
    pub fn record_issued_job(&self, job: ActiveJob) -> Result<()> {
        self.store.insert_job(&job)?;
        self.monitor.on_store_notification(PrintJobSnapshot {
            printer: job.printer,
            job_id: job.job_id,
            job_name: job.job_name,
            state: job.state,
            created_at: Some(job.created_at),
            completed_at: job.completed_at,
        });
        Ok(())
    }

    /// A state change reported by the printing subsystem.
    pub fn on_printer_notification(&self, snapshot: PrintJobSnapshot) -> bool {
        self.monitor.on_push_notification(snapshot)
    }

    // -- Billing -------------------------------------------------------------

    /// Charge the parties of one job.
    pub async fn settle(&self, request: &SettlementRequest) -> SettlementReport {
        self.settlement.settle(request).await
    }

    /// Record every billed job the accounting system has resolved.  Returns
    /// the number recorded.
    pub async fn sync_billing_completions(&self, jobs: &[BilledJob]) -> Result<usize> {
        let finalized = self
            .completion
            .finalize(jobs, self.gateway.system_time())
            .await?;
        for job in &finalized {
            self.store.record_external_completion(job)?;
        }
        info!(
            resolved = finalized.len(),
            pending = jobs.len() - finalized.len(),
            "billing completions synced"
        );
        Ok(finalized.len())
    }

    // -- Print release -------------------------------------------------------

    /// Register a card for `identity`.  The raw reading is stored in the
    /// site's canonical card format.
    pub fn register_card(&self, raw: &str, identity: UserIdentity) -> Result<()> {
        let card = self.config().auth.card_format.normalize(raw)?;
        self.cards.register(&card, identity);
        Ok(())
    }

    /// Queue a release request for `user` at `printer`.  Returns the request
    /// when it was accepted.
    pub fn submit_release(
        &self,
        printer: &str,
        reader: &str,
        user: UserId,
    ) -> Option<AuthRequest> {
        let request = AuthRequest::new(user);
        self.auth
            .submit(printer, reader, request.clone())
            .then_some(request)
    }

    /// Wait for the user to present their card, using the configured wait.
    pub async fn wait_for_release(
        &self,
        user: UserId,
        printer: &str,
        reader: &str,
    ) -> Option<AuthRequest> {
        let auth = self.config().auth;
        self.auth
            .wait_for_auth(user, printer, reader, auth.card_format, auth.default_wait())
            .await
    }

    pub fn cancel_release(&self, user: UserId, printer: &str) -> bool {
        self.auth.cancel(user, printer)
    }

    /// A raw card reading reported by the reader at `reader`.
    pub fn card_swiped(&self, reader: &str, raw: &str) {
        self.readers.report_event(
            reader,
            ReaderEvent::CardSwiped {
                card_number: raw.to_string(),
            },
        );
    }

    // -- Admin events --------------------------------------------------------

    pub fn recent_events(&self, limit: u32) -> Result<Vec<AdminEvent>> {
        self.events.recent(limit)
    }

    // -- Config persistence --------------------------------------------------

    fn config_guard(&self) -> MutexGuard<'_, ProxyPrintConfig> {
        self.config
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A clone of the current config.
    pub fn config(&self) -> ProxyPrintConfig {
        self.config_guard().clone()
    }

    /// Update and persist the config.  Monitor and auth settings take effect
    /// at the next start.
    pub fn save_config(&self, config: &ProxyPrintConfig) -> Result<()> {
        *self.config_guard() = config.clone();
        config.persist(&self.data_dir).inspect_err(|e| {
            error!(error = %e, "failed to persist config");
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
