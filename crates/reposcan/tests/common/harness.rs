//! Test harness for isolated scan runs.
//!
//! The `TestHarness` struct owns everything a scan touches:
//! - A temporary SQLite database with all migrations applied
//! - A scratch directory for working directories
//! - Helpers to register repositories and build pipelines around fake providers

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use reposcan::circuit_breaker::BreakerSettings;
use reposcan::db::config_repo::{self, RepositoryConfig};
use reposcan::db::repository_repo::{self, RepositoryRow};
use reposcan::db::{now_timestamp, Database};
use reposcan::fetcher::ArchiveFetcher;
use reposcan::pipeline::ScanPipeline;
use reposcan::provider::ProviderKind;
use reposcan::worker::{ScanJob, ScanOutcome, ScanQueue};

use super::archive::FakeProvider;

pub struct TestHarness {
    /// Keeps the database file and scratch dir alive for the test.
    temp_dir: TempDir,
    pub db: Database,
    pub scratch_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("data").join("reposcan.db"))
            .expect("Failed to open test database");
        let scratch_dir = temp_dir.path().join("scratch");

        Self {
            temp_dir,
            db,
            scratch_dir,
        }
    }

    /// Registers a repository the way the sync pipeline would.
    pub fn register(&self, id: &str, provider: ProviderKind, full_path: &str) {
        let now = now_timestamp();
        let row = RepositoryRow {
            id: id.to_string(),
            name: full_path.rsplit('/').next().unwrap_or(full_path).to_string(),
            full_path: full_path.to_string(),
            provider: provider.as_str().to_string(),
            last_synced: now.clone(),
            monitored_branches: vec!["main".to_string()],
            open_pull_requests: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        repository_repo::upsert(&self.db, &row).expect("Failed to register repository");
    }

    /// Breaker settings with millisecond backoff so retries stay fast.
    pub fn breaker_settings() -> BreakerSettings {
        BreakerSettings {
            max_failures: 5,
            retry_attempts: 2,
            cool_down: Duration::from_secs(30),
            backoff_unit: Duration::from_millis(1),
        }
    }

    pub fn pipeline(&self, providers: &[Arc<FakeProvider>]) -> Arc<ScanPipeline> {
        let mut fetcher = ArchiveFetcher::new(Self::breaker_settings());
        for provider in providers {
            fetcher = fetcher.with_provider(provider.clone());
        }
        Arc::new(ScanPipeline::new(
            self.db.clone(),
            Arc::new(fetcher),
            self.scratch_dir.clone(),
        ))
    }

    pub fn queue(&self) -> ScanQueue {
        ScanQueue::new(self.db.clone())
    }

    /// Runs one scan directly, bypassing the queue.
    pub async fn scan(
        &self,
        pipeline: &ScanPipeline,
        repository_id: &str,
        provider: ProviderKind,
        slug: &str,
    ) -> ScanOutcome {
        let job = ScanJob::new(repository_id, provider, slug, &now_timestamp());
        pipeline.run(&job).await
    }

    pub fn stored_config(&self, repository_id: &str) -> Option<RepositoryConfig> {
        config_repo::find_by_repository_id(&self.db, repository_id)
            .expect("Failed to read repository config")
    }

    /// Entries left in the scratch dir. A missing dir counts as empty.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.scratch_dir) {
            Ok(entries) => entries
                .map(|e| e.expect("Failed to read scratch entry").path())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}
