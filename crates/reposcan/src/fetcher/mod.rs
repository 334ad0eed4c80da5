//! Archive fetcher: default branch → archive stream → file → extracted tree.
//!
//! Provider calls go through one circuit breaker per provider. Only
//! `ProviderUnavailable` is retried or counted against the breaker.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, info};
use tokio::io::AsyncWriteExt;

use crate::circuit_breaker::{BreakerError, BreakerSettings, CircuitBreaker};
use crate::config::ScanConfig;
use crate::error::{Result, ScanError, StorageError};
use crate::provider::{ArchiveStream, GitHubProvider, GitLabProvider, GitProvider, ProviderKind};
use crate::storage::WorkingDirectory;

pub mod extract;

pub use extract::extract_archive;

struct Registered {
    provider: Arc<dyn GitProvider>,
    breaker: Arc<CircuitBreaker>,
}

pub struct ArchiveFetcher {
    providers: HashMap<ProviderKind, Registered>,
    breaker_settings: BreakerSettings,
}

impl ArchiveFetcher {
    pub fn new(breaker_settings: BreakerSettings) -> Self {
        Self {
            providers: HashMap::new(),
            breaker_settings,
        }
    }

    /// Builds a fetcher with every enabled provider from `config`, resolving
    /// their tokens.
    pub fn from_config(config: &ScanConfig) -> Result<Self> {
        let mut fetcher = Self::new(config.breaker_settings());
        for kind in ProviderKind::ALL {
            let settings = config.providers.get(kind);
            if !settings.enabled {
                debug!("Provider {} disabled", kind);
                continue;
            }
            let token = settings.resolve_token(kind)?;
            if token.is_none() {
                debug!("No token configured for {}, public repositories only", kind);
            }
            let provider: Arc<dyn GitProvider> = match kind {
                ProviderKind::GitHub => Arc::new(GitHubProvider::new(&settings.api_url, token)?),
                ProviderKind::GitLab => Arc::new(GitLabProvider::new(&settings.api_url, token)?),
            };
            fetcher = fetcher.with_provider(provider);
        }
        Ok(fetcher)
    }

    /// Registers `provider` under its own kind, replacing any earlier one.
    pub fn with_provider(mut self, provider: Arc<dyn GitProvider>) -> Self {
        let kind = provider.kind();
        let breaker = Arc::new(CircuitBreaker::new(kind.as_str(), self.breaker_settings));
        self.providers.insert(kind, Registered { provider, breaker });
        self
    }

    pub fn supports(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn breaker(&self, kind: ProviderKind) -> Option<&CircuitBreaker> {
        self.providers.get(&kind).map(|r| r.breaker.as_ref())
    }

    /// Downloads the default branch of `slug` into `workdir` and returns the
    /// root of the extracted tree.
    pub async fn fetch(
        &self,
        kind: ProviderKind,
        slug: &str,
        workdir: &WorkingDirectory,
    ) -> Result<PathBuf> {
        let registered = self
            .providers
            .get(&kind)
            .ok_or_else(|| ScanError::UnsupportedProvider(kind.to_string()))?;
        let provider = registered.provider.as_ref();
        let breaker = registered.breaker.as_ref();

        let branch = guarded(kind, breaker, move || provider.default_branch(slug)).await?;
        debug!("Default branch of {} is {}", slug, branch);

        let archive = workdir.archive_path();
        let archive_ref = archive.as_path();
        let branch_ref = branch.as_str();
        let written = guarded(kind, breaker, move || async move {
            let stream = provider.archive_stream(slug, branch_ref).await?;
            write_stream(stream, archive_ref).await
        })
        .await?;
        info!("Downloaded {} bytes for {}@{}", written, slug, branch);

        let tree = workdir.tree_dir();
        let root = tokio::task::spawn_blocking(move || extract_archive(&archive, &tree)).await??;
        Ok(root)
    }
}

async fn guarded<T, F, Fut>(kind: ProviderKind, breaker: &CircuitBreaker, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    breaker
        .execute_if(operation, ScanError::is_retryable)
        .await
        .map_err(|e| match e {
            BreakerError::Open { retry_in } => ScanError::CircuitOpen {
                provider: kind,
                retry_in_ms: u64::try_from(retry_in.as_millis()).unwrap_or(u64::MAX),
            },
            BreakerError::Failed { source, .. } => source,
        })
}

/// Streams the archive to `path`, truncating anything a failed attempt left.
async fn write_stream(mut stream: ArchiveStream, path: &Path) -> Result<u64> {
    let write_err = |e: std::io::Error| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = tokio::fs::File::create(path).await.map_err(write_err)?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(write_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(write_err)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    enum Behavior {
        Serve(Vec<u8>),
        NotFound,
        Unavailable,
        FailOnceThenServe(Vec<u8>),
    }

    struct FakeProvider {
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl FakeProvider {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl GitProvider for FakeProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::GitLab
        }

        async fn default_branch(&self, slug: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::NotFound => Err(ScanError::RepositoryNotFound {
                    provider: self.kind(),
                    slug: slug.to_string(),
                }),
                Behavior::Unavailable => Err(ScanError::ProviderUnavailable {
                    provider: self.kind(),
                    message: "502".to_string(),
                }),
                Behavior::FailOnceThenServe(_) if call == 0 => {
                    Err(ScanError::ProviderUnavailable {
                        provider: self.kind(),
                        message: "reset".to_string(),
                    })
                }
                _ => Ok("main".to_string()),
            }
        }

        async fn archive_stream(&self, _slug: &str, _git_ref: &str) -> Result<ArchiveStream> {
            let bytes = match &self.behavior {
                Behavior::Serve(bytes) | Behavior::FailOnceThenServe(bytes) => bytes.clone(),
                _ => Vec::new(),
            };
            let (head, tail) = bytes.split_at(bytes.len() / 2);
            let chunks = vec![
                Ok(Bytes::copy_from_slice(head)),
                Ok(Bytes::copy_from_slice(tail)),
            ];
            Ok(futures_util::stream::iter(chunks).boxed())
        }
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn settings() -> BreakerSettings {
        BreakerSettings {
            max_failures: 1,
            retry_attempts: 2,
            cool_down: Duration::from_secs(60),
            backoff_unit: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_fetch_extracts_tree() {
        let scratch = TempDir::new().unwrap();
        let provider = FakeProvider::new(Behavior::Serve(zip_bytes(&[(
            "group-app-abc/go.mod",
            "module example.com/app",
        )])));
        let fetcher = ArchiveFetcher::new(settings()).with_provider(provider);
        let workdir = WorkingDirectory::create(scratch.path(), "gl-1").unwrap();

        let root = fetcher
            .fetch(ProviderKind::GitLab, "group/app", &workdir)
            .await
            .unwrap();
        assert!(root.join("go.mod").is_file());
        assert!(workdir.archive_path().is_file());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let scratch = TempDir::new().unwrap();
        let provider = FakeProvider::new(Behavior::NotFound);
        let fetcher = ArchiveFetcher::new(settings()).with_provider(provider.clone());
        let workdir = WorkingDirectory::create(scratch.path(), "gl-1").unwrap();

        let err = fetcher
            .fetch(ProviderKind::GitLab, "group/missing", &workdir)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::RepositoryNotFound { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            fetcher.breaker(ProviderKind::GitLab).unwrap().state(),
            crate::circuit_breaker::BreakerState::Closed
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let scratch = TempDir::new().unwrap();
        let provider =
            FakeProvider::new(Behavior::FailOnceThenServe(zip_bytes(&[("Cargo.toml", "")])));
        let fetcher = ArchiveFetcher::new(settings()).with_provider(provider.clone());
        let workdir = WorkingDirectory::create(scratch.path(), "gl-1").unwrap();

        let root = fetcher
            .fetch(ProviderKind::GitLab, "group/app", &workdir)
            .await
            .unwrap();
        assert!(root.join("Cargo.toml").is_file());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unavailable_opens_circuit() {
        let scratch = TempDir::new().unwrap();
        let provider = FakeProvider::new(Behavior::Unavailable);
        let fetcher = ArchiveFetcher::new(settings()).with_provider(provider.clone());
        let workdir = WorkingDirectory::create(scratch.path(), "gl-1").unwrap();

        let first = fetcher
            .fetch(ProviderKind::GitLab, "group/app", &workdir)
            .await
            .unwrap_err();
        assert!(matches!(first, ScanError::ProviderUnavailable { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        let second = fetcher
            .fetch(ProviderKind::GitLab, "group/app", &workdir)
            .await
            .unwrap_err();
        assert!(matches!(
            second,
            ScanError::CircuitOpen {
                provider: ProviderKind::GitLab,
                ..
            }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_skips_disabled_providers() {
        let mut config = ScanConfig::default();
        config.providers.gitlab.enabled = false;
        config.providers.github.token = Some("ghp_test".to_string());

        let fetcher = ArchiveFetcher::from_config(&config).unwrap();
        assert!(fetcher.supports(ProviderKind::GitHub));
        assert!(!fetcher.supports(ProviderKind::GitLab));
        assert_eq!(
            fetcher.breaker(ProviderKind::GitHub).unwrap().settings(),
            &config.breaker_settings()
        );
    }

    #[tokio::test]
    async fn test_unregistered_provider() {
        let scratch = TempDir::new().unwrap();
        let fetcher = ArchiveFetcher::new(settings());
        let workdir = WorkingDirectory::create(scratch.path(), "gh-1").unwrap();

        let err = fetcher
            .fetch(ProviderKind::GitHub, "acme/web", &workdir)
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedProvider(_)));
        assert!(!fetcher.supports(ProviderKind::GitHub));
    }
}
