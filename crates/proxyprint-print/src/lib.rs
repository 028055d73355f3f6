// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proxyprint Print: job chunk planning, the job status monitor that
// reconciles printer and store feeds, the SQLite job store, user messages,
// and billing settlement.  Collaborators are reached through the traits in
// `proxyprint-bridge`.

pub mod billing;
pub mod chunk;
pub mod media;
pub mod monitor;
pub mod notify;
pub mod retry;
pub mod store;

pub use billing::{BillingSettlement, ExternalCompletionCheck};
pub use chunk::{ChunkPlan, ChunkPlanner, DocumentSelection, JobChunk, PageRange};
pub use media::PrinterMediaSources;
pub use monitor::JobStatusMonitor;
pub use notify::UserMessageWriter;
pub use store::SqliteJobStore;
