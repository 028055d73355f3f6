// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Trait definitions for the external collaborators of the proxy-print core.

use std::time::Duration;

use async_trait::async_trait;

use proxyprint_core::card::CardNumberFormat;
use proxyprint_core::error::Result;
use proxyprint_core::types::{
    ActiveJob, Amount, EventSeverity, ExternalJobId, FinalizedJob, PrintJobSnapshot,
    PrintJobState, ReaderEvent, UsageLogEntry, UserId, UserIdentity, UserMessageKind,
};

/// Access to the printing subsystem.
#[async_trait]
pub trait PrinterGateway: Send + Sync {
    /// Current status of a job, or `None` when the printer does not know it.
    async fn retrieve_print_job(
        &self,
        printer: &str,
        job_id: ExternalJobId,
    ) -> Result<Option<PrintJobSnapshot>>;

    /// The printing subsystem's clock, in epoch seconds.
    fn system_time(&self) -> i64;

    /// Whether `printer` is attached locally.  `None` when unknown.
    fn is_local_printer(&self, printer: &str) -> Option<bool>;
}

/// The system's own committed record of issued print jobs.
pub trait PersistedJobStore: Send + Sync {
    /// The job if it is still active (not yet finalized).
    fn find_active_job(&self, printer: &str, job_id: ExternalJobId) -> Result<Option<ActiveJob>>;

    /// The job if the store already holds it in a finished state.
    fn find_finished_job(&self, printer: &str, job_id: ExternalJobId) -> Result<Option<ActiveJob>>;

    /// The job if an alternate path (e.g. a billing integration) finalized it.
    fn find_finalized_job_alternate_path(
        &self,
        printer: &str,
        job_id: ExternalJobId,
    ) -> Result<Option<FinalizedJob>>;

    /// Persist a new state and completion time.  Implementations run this in
    /// a transaction, rolling back on any error.
    fn update_job_status(
        &self,
        printer: &str,
        job_id: ExternalJobId,
        state: PrintJobState,
        completed_at: Option<i64>,
    ) -> Result<()>;
}

/// Card readers attached to print-release terminals.
#[async_trait]
pub trait ReaderEventSource: Send + Sync {
    /// Wait up to `timeout` for the next event at `reader`.  Card numbers in
    /// returned events are rendered in `format`.  `None` on timeout.
    async fn wait_for_event(
        &self,
        reader: &str,
        format: CardNumberFormat,
        timeout: Duration,
    ) -> Option<ReaderEvent>;

    /// Inject an event at `reader`, waking one waiter.  `Void` releases
    /// only the tasks already waiting and is otherwise discarded.
    fn report_event(&self, reader: &str, event: ReaderEvent);
}

/// Resolves presented credentials to users.
pub trait CredentialResolver: Send + Sync {
    /// The user owning `card_number` (canonical form), if any.
    fn resolve_card(&self, card_number: &str) -> Option<UserIdentity>;
}

/// Destination for administrator-facing events.  Fire-and-forget.
pub trait AdminEventSink: Send + Sync {
    fn publish(&self, topic: &str, severity: EventSeverity, message: &str);
}

/// Destination for user-facing notifications.  Best effort.
pub trait UserNotificationSink: Send + Sync {
    fn write(&self, user: UserId, timestamp: i64, kind: UserMessageKind) -> Result<()>;
}

/// A third-party print accounting system.
#[async_trait]
pub trait BillingAdapter: Send + Sync {
    async fn adjust_shared_account(&self, account: &str, amount: Amount, comment: &str)
    -> Result<()>;

    async fn adjust_user_account(&self, user_name: &str, amount: Amount, comment: &str)
    -> Result<()>;

    async fn get_usage_log(&self, document_names: &[String]) -> Result<Vec<UsageLogEntry>>;
}
