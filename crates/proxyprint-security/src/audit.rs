// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Admin event log: append-only SQLite log of events raised for
// administrators (job state changes, integrity problems, ...).
//
// Schema:
//   admin_event(
//     id         INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp  TEXT    NOT NULL,   -- RFC 3339
//     topic      TEXT    NOT NULL,   -- e.g. "proxy-print"
//     severity   TEXT    NOT NULL,   -- INFO | WARN | ERROR
//     message    TEXT    NOT NULL
//   )

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use proxyprint_bridge::traits::AdminEventSink;
use proxyprint_core::error::{ProxyPrintError, Result};
use proxyprint_core::types::EventSeverity;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS admin_event (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT    NOT NULL,
    topic     TEXT    NOT NULL,
    severity  TEXT    NOT NULL,
    message   TEXT    NOT NULL
);";

fn db_err(e: rusqlite::Error) -> ProxyPrintError {
    ProxyPrintError::Database(e.to_string())
}

/// A single stored admin event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminEvent {
    pub id: i64,
    pub timestamp: String,
    pub topic: String,
    pub severity: String,
    pub message: String,
}

/// Append-only admin event log backed by a SQLite database.
///
/// The connection sits behind a mutex so the log can be shared as an
/// `Arc<dyn AdminEventSink>` between the reconciler worker and callers.
pub struct AdminEventLog {
    conn: Mutex<Connection>,
}

impl AdminEventLog {
    /// Open (or create) the event database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        debug!("admin event log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory event database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        debug!("in-memory admin event log opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an event.
    #[instrument(skip(self, message), fields(%topic, severity = severity.as_str()))]
    pub fn record(&self, topic: &str, severity: EventSeverity, message: &str) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO admin_event (timestamp, topic, severity, message)
                 VALUES (?1, ?2, ?3, ?4)",
                params![timestamp, topic, severity.as_str(), message],
            )
            .map_err(db_err)?;
        debug!("admin event recorded");
        Ok(())
    }

    /// The most recent `limit` events, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<AdminEvent>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, topic, severity, message
                 FROM admin_event
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(AdminEvent {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    topic: row.get(2)?,
                    severity: row.get(3)?,
                    message: row.get(4)?,
                })
            })
            .map_err(db_err)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(db_err)?);
        }
        Ok(events)
    }

    /// Total number of stored events.
    pub fn count(&self) -> Result<u64> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM admin_event", [], |row| row.get(0))
            .map_err(db_err)
    }
}

impl AdminEventSink for AdminEventLog {
    fn publish(&self, topic: &str, severity: EventSeverity, message: &str) {
        if let Err(e) = self.record(topic, severity, message) {
            error!(topic, "failed to record admin event: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_log() -> AdminEventLog {
        AdminEventLog::open_in_memory().expect("open in-memory event log")
    }

    #[test]
    fn record_and_count() {
        let log = make_log();
        assert_eq!(log.count().unwrap(), 0);
        log.record("proxy-print", EventSeverity::Info, "job 1 completed")
            .unwrap();
        log.publish("proxy-print", EventSeverity::Warn, "job 2 held");
        assert_eq!(log.count().unwrap(), 2);
    }

    #[test]
    fn recent_is_newest_first() {
        let log = make_log();
        for i in 0..5 {
            log.publish("t", EventSeverity::Info, &format!("event {i}"));
        }
        let recent = log.recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent[0].id > recent[1].id);
        assert_eq!(recent[0].message, "event 4");
    }

    #[test]
    fn severity_is_stored_as_keyword() {
        let log = make_log();
        log.publish("t", EventSeverity::Error, "printer stopped");
        let recent = log.recent(1).unwrap();
        assert_eq!(recent[0].severity, "ERROR");
        assert_eq!(recent[0].topic, "t");
    }

    #[test]
    fn file_backed_log_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        {
            let log = AdminEventLog::open(&path).unwrap();
            log.publish("t", EventSeverity::Info, "persisted");
        }
        let log = AdminEventLog::open(&path).unwrap();
        assert_eq!(log.count().unwrap(), 1);
    }
}
