// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persisted job store backed by SQLite.
//
// Holds the committed record of every job issued through the proxy path
// (`print_out`) and the finalizations reported by alternate paths such as a
// billing integration (`external_completion`).  Times are epoch seconds and
// states are stored as IPP `job-state` values.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

use proxyprint_bridge::traits::PersistedJobStore;
use proxyprint_core::error::{ProxyPrintError, Result};
use proxyprint_core::types::{ActiveJob, ExternalJobId, FinalizedJob, PrintJobState, UserId};

const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS print_out (
        printer TEXT NOT NULL,
        job_id INTEGER NOT NULL,
        job_name TEXT NOT NULL,
        user_id INTEGER,
        state INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        completed_at INTEGER,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (printer, job_id)
    );
    CREATE TABLE IF NOT EXISTS external_completion (
        printer TEXT NOT NULL,
        job_id INTEGER NOT NULL,
        user_id INTEGER,
        state INTEGER NOT NULL,
        completed_at INTEGER NOT NULL,
        finalized_by TEXT NOT NULL,
        PRIMARY KEY (printer, job_id)
    );
"#;

/// IPP values of the terminal job states.
const FINISHED_STATES_SQL: &str = "(7, 8, 9)";

fn db_err(e: rusqlite::Error) -> ProxyPrintError {
    ProxyPrintError::Database(e.to_string())
}

/// SQLite implementation of [`PersistedJobStore`].
///
/// `rusqlite` is synchronous; every call holds the connection only for the
/// duration of its statement or transaction.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the store at `path` in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| ProxyPrintError::Database(format!("open: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| ProxyPrintError::Database(format!("WAL pragma: {e}")))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| ProxyPrintError::Database(format!("create tables: {e}")))?;

        info!("job store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ProxyPrintError::Database(format!("open in-memory: {e}")))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| ProxyPrintError::Database(format!("create tables: {e}")))?;

        debug!("in-memory job store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a job issued through the proxy path.
    #[instrument(skip(self, job), fields(printer = %job.printer, job_id = %job.job_id))]
    pub fn insert_job(&self, job: &ActiveJob) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO print_out (printer, job_id, job_name, user_id, state,
                 created_at, completed_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    job.printer,
                    job.job_id.0,
                    job.job_name,
                    job.user_id.map(|u| u.0),
                    job.state.ipp_value(),
                    job.created_at,
                    job.completed_at,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| ProxyPrintError::Database(format!("insert job: {e}")))?;

        info!("job recorded");
        Ok(())
    }

    /// Record that an alternate path finalized a job.  Replaces any earlier
    /// finalization of the same job.
    #[instrument(skip(self, job), fields(printer = %job.printer, job_id = %job.job_id))]
    pub fn record_external_completion(&self, job: &FinalizedJob) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO external_completion
                 (printer, job_id, user_id, state, completed_at, finalized_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    job.printer,
                    job.job_id.0,
                    job.user_id.map(|u| u.0),
                    job.state.ipp_value(),
                    job.completed_at,
                    job.finalized_by,
                ],
            )
            .map_err(|e| ProxyPrintError::Database(format!("record completion: {e}")))?;

        debug!(finalized_by = %job.finalized_by, "external completion recorded");
        Ok(())
    }

    /// A job in any state.
    pub fn get_job(&self, printer: &str, job_id: ExternalJobId) -> Result<Option<ActiveJob>> {
        self.conn()
            .query_row(
                "SELECT printer, job_id, job_name, user_id, state, created_at, completed_at
                 FROM print_out WHERE printer = ?1 AND job_id = ?2",
                params![printer, job_id.0],
                row_to_active_job,
            )
            .optional()
            .map_err(db_err)
    }

    /// Number of jobs not yet in a terminal state.
    pub fn active_count(&self) -> Result<u64> {
        self.conn()
            .query_row(
                &format!("SELECT COUNT(*) FROM print_out WHERE state NOT IN {FINISHED_STATES_SQL}"),
                [],
                |row| row.get(0),
            )
            .map_err(db_err)
    }
}

impl PersistedJobStore for SqliteJobStore {
    #[instrument(skip(self))]
    fn find_active_job(&self, printer: &str, job_id: ExternalJobId) -> Result<Option<ActiveJob>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT printer, job_id, job_name, user_id, state, created_at, completed_at
                     FROM print_out
                     WHERE printer = ?1 AND job_id = ?2 AND state NOT IN {FINISHED_STATES_SQL}"
                ),
                params![printer, job_id.0],
                row_to_active_job,
            )
            .optional()
            .map_err(db_err)
    }

    #[instrument(skip(self))]
    fn find_finished_job(&self, printer: &str, job_id: ExternalJobId) -> Result<Option<ActiveJob>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT printer, job_id, job_name, user_id, state, created_at, completed_at
                     FROM print_out
                     WHERE printer = ?1 AND job_id = ?2 AND state IN {FINISHED_STATES_SQL}"
                ),
                params![printer, job_id.0],
                row_to_active_job,
            )
            .optional()
            .map_err(db_err)
    }

    #[instrument(skip(self))]
    fn find_finalized_job_alternate_path(
        &self,
        printer: &str,
        job_id: ExternalJobId,
    ) -> Result<Option<FinalizedJob>> {
        self.conn()
            .query_row(
                "SELECT printer, job_id, user_id, state, completed_at, finalized_by
                 FROM external_completion WHERE printer = ?1 AND job_id = ?2",
                params![printer, job_id.0],
                |row| {
                    Ok(FinalizedJob {
                        printer: row.get(0)?,
                        job_id: ExternalJobId(row.get(1)?),
                        user_id: row.get::<_, Option<i64>>(2)?.map(UserId),
                        state: PrintJobState::from_ipp(row.get(3)?),
                        completed_at: row.get(4)?,
                        finalized_by: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    #[instrument(skip(self))]
    fn update_job_status(
        &self,
        printer: &str,
        job_id: ExternalJobId,
        state: PrintJobState,
        completed_at: Option<i64>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().map_err(db_err)?;

        // An error from `execute` drops `tx`, which rolls back.
        let rows = tx
            .execute(
                "UPDATE print_out
                 SET state = ?1, completed_at = COALESCE(?2, completed_at), updated_at = ?3
                 WHERE printer = ?4 AND job_id = ?5",
                params![
                    state.ipp_value(),
                    completed_at,
                    Utc::now().to_rfc3339(),
                    printer,
                    job_id.0
                ],
            )
            .map_err(|e| ProxyPrintError::Database(format!("update status: {e}")))?;

        if rows == 0 {
            tx.rollback().map_err(db_err)?;
            return Err(ProxyPrintError::Database(format!(
                "job {job_id} on {printer} not found"
            )));
        }

        tx.commit().map_err(db_err)?;
        debug!("job status updated");
        Ok(())
    }
}

/// Column order must match the SELECTs above.
fn row_to_active_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActiveJob> {
    Ok(ActiveJob {
        printer: row.get(0)?,
        job_id: ExternalJobId(row.get(1)?),
        job_name: row.get(2)?,
        user_id: row.get::<_, Option<i64>>(3)?.map(UserId),
        state: PrintJobState::from_ipp(row.get(4)?),
        created_at: row.get(5)?,
        completed_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_job(job_id: u32) -> ActiveJob {
        ActiveJob {
            printer: "office".into(),
            job_id: ExternalJobId(job_id),
            job_name: "(1-) report.pdf".into(),
            user_id: Some(UserId(42)),
            state: PrintJobState::Pending,
            created_at: 1_700_000_000,
            completed_at: None,
        }
    }

    #[test]
    fn insert_and_find_active() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        store.insert_job(&test_job(7)).expect("insert");

        let found = store
            .find_active_job("office", ExternalJobId(7))
            .expect("find")
            .expect("found");
        assert_eq!(found, test_job(7));
        assert!(
            store
                .find_active_job("lobby", ExternalJobId(7))
                .expect("find")
                .is_none()
        );
    }

    #[test]
    fn update_commits_state_and_completion() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        store.insert_job(&test_job(7)).expect("insert");

        store
            .update_job_status("office", ExternalJobId(7), PrintJobState::Processing, None)
            .expect("update");
        let job = store.get_job("office", ExternalJobId(7)).unwrap().unwrap();
        assert_eq!(job.state, PrintJobState::Processing);
        assert_eq!(job.completed_at, None);

        store
            .update_job_status(
                "office",
                ExternalJobId(7),
                PrintJobState::Completed,
                Some(1_700_000_060),
            )
            .expect("update");
        let job = store.get_job("office", ExternalJobId(7)).unwrap().unwrap();
        assert_eq!(job.state, PrintJobState::Completed);
        assert_eq!(job.completed_at, Some(1_700_000_060));
    }

    #[test]
    fn finished_jobs_are_not_active() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        store.insert_job(&test_job(1)).expect("insert");
        store.insert_job(&test_job(2)).expect("insert");
        assert_eq!(store.active_count().unwrap(), 2);

        store
            .update_job_status("office", ExternalJobId(1), PrintJobState::Canceled, Some(5))
            .expect("update");
        assert!(
            store
                .find_active_job("office", ExternalJobId(1))
                .unwrap()
                .is_none()
        );
        assert_eq!(store.active_count().unwrap(), 1);

        let finished = store
            .find_finished_job("office", ExternalJobId(1))
            .unwrap()
            .expect("finished row");
        assert_eq!(finished.state, PrintJobState::Canceled);
        assert_eq!(finished.completed_at, Some(5));
        assert!(
            store
                .find_finished_job("office", ExternalJobId(2))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn update_of_unknown_job_fails_without_writing() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let result =
            store.update_job_status("office", ExternalJobId(99), PrintJobState::Completed, None);
        assert!(matches!(result, Err(ProxyPrintError::Database(_))));
        assert!(store.get_job("office", ExternalJobId(99)).unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        store.insert_job(&test_job(3)).expect("insert");
        assert!(store.insert_job(&test_job(3)).is_err());
    }

    #[test]
    fn external_completion_lookup() {
        let store = SqliteJobStore::open_in_memory().expect("open in-memory db");
        let finalized = FinalizedJob {
            printer: "office".into(),
            job_id: ExternalJobId(12),
            user_id: Some(UserId(42)),
            state: PrintJobState::Completed,
            completed_at: 1_700_000_100,
            finalized_by: "billing".into(),
        };
        store.record_external_completion(&finalized).expect("record");

        let found = store
            .find_finalized_job_alternate_path("office", ExternalJobId(12))
            .unwrap();
        assert_eq!(found, Some(finalized));
        assert!(
            store
                .find_finalized_job_alternate_path("office", ExternalJobId(13))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");
        {
            let store = SqliteJobStore::open(&path).unwrap();
            store.insert_job(&test_job(5)).unwrap();
        }
        let store = SqliteJobStore::open(&path).unwrap();
        assert!(store.get_job("office", ExternalJobId(5)).unwrap().is_some());
    }
}
