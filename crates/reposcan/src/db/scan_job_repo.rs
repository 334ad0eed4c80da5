//! Scan job repository: durable queue storage in the `scan_jobs` table.
//!
//! Status transitions are guarded in SQL (`WHERE status = ...`) so a row can
//! only move forward: queued → running → done | failed.

use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};

use super::{Database, DatabaseError};

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_DONE: &str = "done";
pub const STATUS_FAILED: &str = "failed";

/// Error text recorded on jobs found running at startup.
pub const INTERRUPTED: &str = "interrupted";

/// A raw scan job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanJobRow {
    pub id: String,
    pub repository_id: String,
    pub provider: String,
    pub slug: String,
    pub status: String,
    pub error: Option<String>,
    pub enqueued_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub worker_id: Option<i64>,
}

impl ScanJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            repository_id: row.get("repository_id")?,
            provider: row.get("provider")?,
            slug: row.get("slug")?,
            status: row.get("status")?,
            error: row.get("error")?,
            enqueued_at: row.get("enqueued_at")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            worker_id: row.get("worker_id")?,
        })
    }
}

/// Result of [`insert_unless_active`].
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Inserted(ScanJobRow),
    /// A queued or running job for the same repository already existed.
    Existing(ScanJobRow),
}

impl Admission {
    pub fn into_row(self) -> ScanJobRow {
        match self {
            Admission::Inserted(row) | Admission::Existing(row) => row,
        }
    }
}

const ACTIVE_FOR_REPOSITORY: &str = "SELECT * FROM scan_jobs
     WHERE repository_id = ?1 AND status IN ('queued', 'running')
     ORDER BY enqueued_at, rowid LIMIT 1";

fn insert_row(conn: &rusqlite::Connection, job: &ScanJobRow) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO scan_jobs (id, repository_id, provider, slug, status, error,
         enqueued_at, started_at, finished_at, worker_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            job.id,
            job.repository_id,
            job.provider,
            job.slug,
            job.status,
            job.error,
            job.enqueued_at,
            job.started_at,
            job.finished_at,
            job.worker_id,
        ],
    )?;
    Ok(())
}

/// Inserts a job row as-is.
pub fn insert(db: &Database, job: &ScanJobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        insert_row(conn, job)?;
        Ok(())
    })
}

/// Inserts `job` unless the repository already has a queued or running job.
/// The check and the insert share one immediate transaction, so concurrent
/// submitters from other processes serialize on the write lock.
pub fn insert_unless_active(db: &Database, job: &ScanJobRow) -> Result<Admission, DatabaseError> {
    db.with_conn(|conn| {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let existing = tx
            .query_row(ACTIVE_FOR_REPOSITORY, params![job.repository_id], ScanJobRow::from_row)
            .optional()?;
        let admission = match existing {
            Some(row) => Admission::Existing(row),
            None => {
                insert_row(&tx, job)?;
                Admission::Inserted(job.clone())
            }
        };
        tx.commit()?;
        Ok(admission)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ScanJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM scan_jobs WHERE id = ?1",
                params![id],
                ScanJobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// The oldest queued or running job of a repository, if any.
pub fn find_active_for_repository(
    db: &Database,
    repository_id: &str,
) -> Result<Option<ScanJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(ACTIVE_FOR_REPOSITORY, params![repository_id], ScanJobRow::from_row)
            .optional()?;
        Ok(row)
    })
}

/// Moves the oldest queued job to running in a single statement and returns
/// it. Two claimers can never both receive the same row.
pub fn claim_next(
    db: &Database,
    worker_id: i64,
    started_at: &str,
) -> Result<Option<ScanJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "UPDATE scan_jobs SET status = 'running', started_at = ?1, worker_id = ?2
                 WHERE id = (
                     SELECT id FROM scan_jobs WHERE status = 'queued'
                     ORDER BY enqueued_at, rowid LIMIT 1
                 ) AND status = 'queued'
                 RETURNING *",
                params![started_at, worker_id],
                ScanJobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Marks a running job done. Returns false if the job was not running.
pub fn mark_done(db: &Database, id: &str, finished_at: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE scan_jobs SET status = 'done', error = NULL, finished_at = ?2
             WHERE id = ?1 AND status = 'running'",
            params![id, finished_at],
        )?;
        Ok(changed > 0)
    })
}

/// Marks a queued or running job failed. Returns false if it was already terminal.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error: &str,
    finished_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE scan_jobs SET status = 'failed', error = ?2, finished_at = ?3
             WHERE id = ?1 AND status IN ('queued', 'running')",
            params![id, error, finished_at],
        )?;
        Ok(changed > 0)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM scan_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Fails every job still marked running. Only safe before any worker starts.
pub fn recover_interrupted(db: &Database, finished_at: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE scan_jobs SET status = 'failed', error = ?1, finished_at = ?2
             WHERE status = 'running'",
            params![INTERRUPTED, finished_at],
        )?;
        Ok(changed)
    })
}

/// Most recently enqueued jobs first.
pub fn list_recent(db: &Database, limit: u32) -> Result<Vec<ScanJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare("SELECT * FROM scan_jobs ORDER BY enqueued_at DESC, rowid DESC LIMIT ?1")?;
        let rows = stmt
            .query_map(params![limit], ScanJobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
