//! Durable scan queue backed by the `scan_jobs` table.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Notify;

use crate::db::scan_job_repo::{self, Admission};
use crate::db::{now_timestamp, repository_repo, Database};
use crate::error::{Result, ScanError};
use crate::provider::ProviderKind;

use super::job::{JobStatus, ScanJob};

/// Handle to the durable queue. Cheap to clone; every clone shares the same
/// wake-up signal, so a `submit` on one wakes workers holding another.
#[derive(Clone)]
pub struct ScanQueue {
    db: Database,
    notify: Arc<Notify>,
}

impl ScanQueue {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Records a scan request and returns at once.
    ///
    /// Fails with `RepositoryUnknown` for unregistered ids. If the repository
    /// already has a queued or running job, that job is returned instead of a
    /// new one. An empty slug falls back to the repository's full path.
    pub async fn submit(
        &self,
        repository_id: &str,
        provider: ProviderKind,
        slug: &str,
    ) -> Result<ScanJob> {
        let id = repository_id.to_string();
        let repository = self
            .db
            .run(move |db| repository_repo::find_by_id(db, &id))
            .await?
            .ok_or_else(|| ScanError::RepositoryUnknown(repository_id.to_string()))?;

        if repository.provider != provider.as_str() {
            warn!(
                "Repository {} is registered for {}, scanning via {}",
                repository_id, repository.provider, provider
            );
        }

        let slug = if slug.trim().is_empty() {
            repository.full_path.clone()
        } else {
            slug.trim().to_string()
        };
        let row = ScanJob::new(repository_id, provider, &slug, &now_timestamp()).to_row();

        let admission = self
            .db
            .run(move |db| scan_job_repo::insert_unless_active(db, &row))
            .await?;

        let job = match admission {
            Admission::Inserted(row) => {
                let job = ScanJob::try_from(row)?;
                info!("Queued scan {} for {} ({})", job.id, job.repository_id, job.slug);
                self.notify.notify_one();
                job
            }
            Admission::Existing(row) => {
                let job = ScanJob::try_from(row)?;
                info!(
                    "Scan {} for {} already {}, not queueing another",
                    job.id, job.repository_id, job.status
                );
                job
            }
        };
        Ok(job)
    }

    /// Atomically takes the oldest queued job for `worker_id`.
    pub async fn claim_next(&self, worker_id: i64) -> Result<Option<ScanJob>> {
        let claimed = self
            .db
            .run(move |db| scan_job_repo::claim_next(db, worker_id, &now_timestamp()))
            .await?;
        match claimed {
            Some(row) => {
                let job = ScanJob::try_from(row)?;
                debug!("Worker {} claimed scan {}", worker_id, job.id);
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Marks a running job done. False if it was not running.
    pub async fn complete(&self, job_id: &str) -> Result<bool> {
        let id = job_id.to_string();
        let changed = self
            .db
            .run(move |db| scan_job_repo::mark_done(db, &id, &now_timestamp()))
            .await?;
        Ok(changed)
    }

    /// Marks a job failed with `error`. False if it was already terminal.
    pub async fn fail(&self, job_id: &str, error: &str) -> Result<bool> {
        let id = job_id.to_string();
        let error = error.to_string();
        let changed = self
            .db
            .run(move |db| scan_job_repo::mark_failed(db, &id, &error, &now_timestamp()))
            .await?;
        Ok(changed)
    }

    pub async fn find(&self, job_id: &str) -> Result<Option<ScanJob>> {
        let id = job_id.to_string();
        let row = self
            .db
            .run(move |db| scan_job_repo::find_by_id(db, &id))
            .await?;
        Ok(row.map(ScanJob::try_from).transpose()?)
    }

    pub async fn count_by_status(&self, status: JobStatus) -> Result<u64> {
        let count = self
            .db
            .run(move |db| scan_job_repo::count_by_status(db, status.as_str()))
            .await?;
        Ok(count)
    }

    pub async fn list_recent(&self, limit: u32) -> Result<Vec<ScanJob>> {
        let rows = self
            .db
            .run(move |db| scan_job_repo::list_recent(db, limit))
            .await?;
        let jobs = rows
            .into_iter()
            .map(ScanJob::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    /// Fails jobs a previous process left running. Call before starting workers.
    pub async fn recover_interrupted(&self) -> Result<usize> {
        let recovered = self
            .db
            .run(|db| scan_job_repo::recover_interrupted(db, &now_timestamp()))
            .await?;
        if recovered > 0 {
            warn!("Marked {} interrupted scan(s) as failed", recovered);
        }
        Ok(recovered)
    }

    /// Waits for a `submit` signal or until `timeout` passes.
    pub async fn wait_for_work(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }

    /// Wakes every waiting worker, e.g. for shutdown.
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }
}
