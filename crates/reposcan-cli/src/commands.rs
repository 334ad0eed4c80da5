use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use reposcan::config::ScanConfig;
use reposcan::db::repository_repo::{self, RepositoryRow};
use reposcan::db::{config_repo, now_timestamp, Database};
use reposcan::detect::Detector;
use reposcan::fetcher::ArchiveFetcher;
use reposcan::infer;
use reposcan::pipeline::ScanPipeline;
use reposcan::provider::ProviderKind;
use reposcan::storage::sweep_stale_workdirs;
use reposcan::worker::{JobStatus, ScanOutcome, ScanQueue, WorkerPool};

fn open_database(config: &ScanConfig) -> Result<Database> {
    let path = config.database_path()?;
    Database::open(&path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn sweep_scratch(config: &ScanConfig) -> Result<usize> {
    std::fs::create_dir_all(&config.scratch_dir).with_context(|| {
        format!("Failed to create scratch dir {}", config.scratch_dir.display())
    })?;
    let removed = sweep_stale_workdirs(&config.scratch_dir, config.stale_workdir_max_age())?;
    Ok(removed)
}

fn report(outcome: &ScanOutcome) {
    if outcome.success {
        let names: Vec<&str> = outcome.frameworks.iter().map(|f| f.kind.as_str()).collect();
        info!(
            "Scan {} of {} done: [{}]",
            outcome.job_id,
            outcome.repository_id,
            names.join(", ")
        );
    } else {
        error!(
            "Scan {} of {} failed: {}",
            outcome.job_id,
            outcome.repository_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
}

pub async fn serve(config: ScanConfig, workers: Option<usize>) -> Result<()> {
    let worker_count = workers.unwrap_or(config.worker_count);
    if worker_count == 0 {
        bail!("Worker count must be at least 1");
    }

    let db = open_database(&config)?;
    let queue = ScanQueue::new(db.clone());

    let recovered = queue.recover_interrupted().await?;
    if recovered > 0 {
        warn!("Marked {} interrupted scans as failed", recovered);
    }
    let swept = sweep_scratch(&config)?;
    if swept > 0 {
        info!("Removed {} stale working directories", swept);
    }

    let fetcher = Arc::new(ArchiveFetcher::from_config(&config)?);
    let pipeline = Arc::new(ScanPipeline::new(db, fetcher, config.scratch_dir.clone()));
    let mut pool = WorkerPool::start(queue, pipeline, worker_count, config.poll_interval());

    let (stop_tx, mut stop_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    info!("Waiting for scan jobs (Ctrl-C to stop)");
    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                info!("Interrupt received, finishing running scans");
                break;
            }
            outcome = pool.recv_result() => match outcome {
                Some(outcome) => report(&outcome),
                None => break,
            },
        }
    }

    pool.shutdown();
    pool.wait().await;
    Ok(())
}

pub fn register(
    config: &ScanConfig,
    id: &str,
    provider: ProviderKind,
    full_path: &str,
    name: Option<String>,
    branches: Vec<String>,
) -> Result<()> {
    let full_path = full_path.trim().trim_matches('/');
    if full_path.is_empty() {
        bail!("Full path must not be empty");
    }

    let db = open_database(config)?;
    let now = now_timestamp();
    let name = name.unwrap_or_else(|| {
        full_path
            .rsplit('/')
            .next()
            .unwrap_or(full_path)
            .to_string()
    });
    let row = RepositoryRow {
        id: id.to_string(),
        name,
        full_path: full_path.to_string(),
        provider: provider.as_str().to_string(),
        last_synced: now.clone(),
        monitored_branches: branches,
        open_pull_requests: 0,
        created_at: now.clone(),
        updated_at: now,
    };
    repository_repo::upsert(&db, &row)?;

    println!("Registered {} ({} on {})", row.id, row.full_path, provider);
    Ok(())
}

pub async fn enqueue(
    config: &ScanConfig,
    repository_id: &str,
    provider: ProviderKind,
    slug: &str,
) -> Result<()> {
    let queue = ScanQueue::new(open_database(config)?);
    let job = queue.submit(repository_id, provider, slug).await?;
    print_json(&job)
}

pub async fn status(config: &ScanConfig, job_id: Option<&str>, limit: u32) -> Result<()> {
    let queue = ScanQueue::new(open_database(config)?);

    if let Some(job_id) = job_id {
        return match queue.find(job_id).await? {
            Some(job) => print_json(&job),
            None => bail!("No scan job with id {}", job_id),
        };
    }

    for status in [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Done,
        JobStatus::Failed,
    ] {
        println!("{:<8} {}", status.as_str(), queue.count_by_status(status).await?);
    }

    let recent = queue.list_recent(limit).await?;
    if !recent.is_empty() {
        println!();
    }
    for job in recent {
        println!(
            "{}  {:<7}  {:<24}  {}{}",
            job.enqueued_at,
            job.status.as_str(),
            job.repository_id,
            job.slug,
            job.error
                .map(|e| format!("  ({})", e))
                .unwrap_or_default()
        );
    }
    Ok(())
}

pub fn show_config(config: &ScanConfig, repository_id: &str) -> Result<()> {
    let db = open_database(config)?;
    match config_repo::find_by_repository_id(&db, repository_id)? {
        Some(stored) => print_json(&stored),
        None => bail!("No test configuration stored for {}", repository_id),
    }
}

pub fn set_preference(config: &ScanConfig, repository_id: &str, value: Option<&str>) -> Result<()> {
    let preference = value
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("Preference must be valid JSON")?;

    let db = open_database(config)?;
    let updated = config_repo::set_user_test_folder_preference(
        &db,
        repository_id,
        preference.as_ref(),
        &now_timestamp(),
    )?;
    if !updated {
        bail!(
            "No test configuration stored for {}; scan it first",
            repository_id
        );
    }

    match preference {
        Some(_) => println!("Updated test folder preference for {}", repository_id),
        None => println!("Cleared test folder preference for {}", repository_id),
    }
    Ok(())
}

pub fn detect(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("{} is not a directory", path.display());
    }

    let frameworks = Detector::new().detect(path);
    let conventions = infer::infer(&frameworks, path);
    print_json(&serde_json::json!({
        "frameworks": frameworks,
        "conventions": conventions,
    }))
}

pub fn sweep(config: &ScanConfig) -> Result<()> {
    let removed = sweep_scratch(config)?;
    println!(
        "Removed {} stale working directories from {}",
        removed,
        config.scratch_dir.display()
    );
    Ok(())
}
