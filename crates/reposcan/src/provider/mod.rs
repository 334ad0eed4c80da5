//! Source-control providers the scanner can download archives from.
//!
//! Only two operations are consumed: resolving a repository's default branch
//! and opening a ZIP archive stream for a ref. Everything else a provider API
//! offers lives outside this crate.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

mod github;
mod gitlab;
mod http;

pub use github::{GitHubProvider, DEFAULT_API_URL as GITHUB_API_URL};
pub use gitlab::{GitLabProvider, DEFAULT_API_URL as GITLAB_API_URL};

/// Raw archive bytes as they arrive from the provider.
pub type ArchiveStream = BoxStream<'static, Result<Bytes>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    GitLab,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::GitHub, ProviderKind::GitLab];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            _ => Err(ScanError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// A provider's archive API, normalized to the two calls a scan needs.
///
/// Implementations map "no such repository" to
/// [`ScanError::RepositoryNotFound`] and every transport, auth or server-side
/// failure to [`ScanError::ProviderUnavailable`].
#[async_trait]
pub trait GitProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn default_branch(&self, slug: &str) -> Result<String>;

    async fn archive_stream(&self, slug: &str, git_ref: &str) -> Result<ArchiveStream>;
}
