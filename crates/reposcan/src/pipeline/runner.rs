use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::db::config_repo::{self, RepositoryConfig};
use crate::db::{now_timestamp, Database};
use crate::detect::{DetectedFramework, Detector};
use crate::error::Result;
use crate::fetcher::ArchiveFetcher;
use crate::infer;
use crate::sanitize;
use crate::storage::WorkingDirectory;
use crate::worker::job::{ScanJob, ScanOutcome};

/// Runs one scan job end to end: fetch → detect → infer → persist.
///
/// The config is written once, after every other step succeeded, so a failed
/// scan never leaves a partial config behind. The working directory is
/// dropped on every path out of [`ScanPipeline::run`].
pub struct ScanPipeline {
    db: Database,
    fetcher: Arc<ArchiveFetcher>,
    detector: Detector,
    scratch_dir: PathBuf,
}

impl ScanPipeline {
    pub fn new(db: Database, fetcher: Arc<ArchiveFetcher>, scratch_dir: PathBuf) -> Self {
        Self {
            db,
            fetcher,
            detector: Detector::new(),
            scratch_dir,
        }
    }

    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn scratch_dir(&self) -> &std::path::Path {
        &self.scratch_dir
    }

    /// Never fails; errors come back as a failed outcome.
    pub async fn run(&self, job: &ScanJob) -> ScanOutcome {
        let span = info_span!("scan",
            job_id = %job.id,
            repository_id = %job.repository_id,
            provider = %job.provider,
            slug = %job.slug,
        );

        match self.execute(job).instrument(span).await {
            Ok(frameworks) => {
                info!(
                    "Scan of {} finished with {} framework(s)",
                    job.repository_id,
                    frameworks.len()
                );
                ScanOutcome::success(job, frameworks)
            }
            Err(e) => {
                warn!("Scan of {} failed: {}", job.repository_id, e);
                ScanOutcome::failure(job, e.to_string())
            }
        }
    }

    async fn execute(&self, job: &ScanJob) -> Result<Vec<DetectedFramework>> {
        let workdir = WorkingDirectory::create(&self.scratch_dir, &job.repository_id)?;
        debug!("Using working directory {}", sanitize::redact_path(workdir.path()));

        // Step 1: Fetch
        let root = self
            .fetcher
            .fetch(job.provider, &job.slug, &workdir)
            .instrument(info_span!("fetch"))
            .await?;

        // Step 2+3: Detect and infer
        let detector = self.detector;
        let (frameworks, conventions) = tokio::task::spawn_blocking(move || {
            let frameworks = {
                let _step = info_span!("detect").entered();
                detector.detect(&root)
            };
            let conventions = {
                let _step = info_span!("infer").entered();
                infer::infer(&frameworks, &root)
            };
            (frameworks, conventions)
        })
        .await?;

        // Step 4: Carry over the user's preference
        let repository_id = job.repository_id.clone();
        let previous = self
            .db
            .run(move |db| config_repo::find_by_repository_id(db, &repository_id))
            .instrument(info_span!("load_preference"))
            .await?;
        let preference = previous.and_then(|config| config.user_test_folder_preference);

        // Step 5: Persist
        let config = RepositoryConfig::from_scan(
            &job.repository_id,
            frameworks.clone(),
            conventions,
            preference,
            &now_timestamp(),
        );
        self.db
            .run(move |db| config_repo::upsert(db, &config))
            .instrument(info_span!("persist"))
            .await?;

        drop(workdir);
        Ok(frameworks)
    }
}
