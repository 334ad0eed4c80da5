pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod fetcher;
pub mod infer;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod worker;

pub use circuit_breaker::{BreakerError, BreakerSettings, BreakerState, CircuitBreaker};
pub use config::{load_config, ScanConfig};
pub use db::config_repo::RepositoryConfig;
pub use db::{Database, DatabaseError};
pub use detect::{DetectedFramework, Detector, FrameworkKind};
pub use error::{ConfigError, Result, ScanError, StorageError};
pub use fetcher::ArchiveFetcher;
pub use infer::{Conventions, TestType};
pub use logging::LogFormat;
pub use pipeline::ScanPipeline;
pub use provider::{GitHubProvider, GitLabProvider, GitProvider, ProviderKind};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::WorkingDirectory;
pub use worker::{JobStatus, ScanJob, ScanOutcome, ScanQueue, WorkerPool};
