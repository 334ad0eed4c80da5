use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::scan_job_repo::{self, ScanJobRow};
use crate::db::DatabaseError;
use crate::detect::DetectedFramework;
use crate::provider::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => scan_job_repo::STATUS_QUEUED,
            JobStatus::Running => scan_job_repo::STATUS_RUNNING,
            JobStatus::Done => scan_job_repo::STATUS_DONE,
            JobStatus::Failed => scan_job_repo::STATUS_FAILED,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            scan_job_repo::STATUS_QUEUED => Ok(JobStatus::Queued),
            scan_job_repo::STATUS_RUNNING => Ok(JobStatus::Running),
            scan_job_repo::STATUS_DONE => Ok(JobStatus::Done),
            scan_job_repo::STATUS_FAILED => Ok(JobStatus::Failed),
            other => Err(DatabaseError::InvalidValue {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// A request to scan one repository, as tracked by the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    pub id: String,
    pub repository_id: String,
    pub provider: ProviderKind,
    pub slug: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub enqueued_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub worker_id: Option<i64>,
}

impl ScanJob {
    /// A fresh queued job.
    pub fn new(repository_id: &str, provider: ProviderKind, slug: &str, enqueued_at: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repository_id: repository_id.to_string(),
            provider,
            slug: slug.to_string(),
            status: JobStatus::Queued,
            error: None,
            enqueued_at: enqueued_at.to_string(),
            started_at: None,
            finished_at: None,
            worker_id: None,
        }
    }

    pub fn to_row(&self) -> ScanJobRow {
        ScanJobRow {
            id: self.id.clone(),
            repository_id: self.repository_id.clone(),
            provider: self.provider.to_string(),
            slug: self.slug.clone(),
            status: self.status.to_string(),
            error: self.error.clone(),
            enqueued_at: self.enqueued_at.clone(),
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
            worker_id: self.worker_id,
        }
    }
}

impl TryFrom<ScanJobRow> for ScanJob {
    type Error = DatabaseError;

    fn try_from(row: ScanJobRow) -> Result<Self, Self::Error> {
        let provider = row
            .provider
            .parse::<ProviderKind>()
            .map_err(|_| DatabaseError::InvalidValue {
                column: "provider",
                value: row.provider.clone(),
            })?;
        Ok(Self {
            status: row.status.parse()?,
            id: row.id,
            repository_id: row.repository_id,
            provider,
            slug: row.slug,
            error: row.error,
            enqueued_at: row.enqueued_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            worker_id: row.worker_id,
        })
    }
}

/// What a worker reports after running one job.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub job_id: String,
    pub repository_id: String,
    pub success: bool,
    pub frameworks: Vec<DetectedFramework>,
    pub error: Option<String>,
}

impl ScanOutcome {
    pub fn success(job: &ScanJob, frameworks: Vec<DetectedFramework>) -> Self {
        Self {
            job_id: job.id.clone(),
            repository_id: job.repository_id.clone(),
            success: true,
            frameworks,
            error: None,
        }
    }

    pub fn failure(job: &ScanJob, error: String) -> Self {
        Self {
            job_id: job.id.clone(),
            repository_id: job.repository_id.clone(),
            success: false,
            frameworks: vec![],
            error: Some(error),
        }
    }
}
