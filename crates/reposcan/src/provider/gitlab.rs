//! GitLab archive client. The archive endpoint streams the ZIP directly.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::SecretString;
use serde::Deserialize;

use super::http;
use super::{ArchiveStream, GitProvider, ProviderKind};
use crate::error::{Result, ScanError};

pub const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    /// Empty projects have no default branch.
    default_branch: Option<String>,
}

pub struct GitLabProvider {
    api: Client,
    download: Client,
    api_url: String,
    token: Option<SecretString>,
}

impl GitLabProvider {
    pub fn new(api_url: impl Into<String>, token: Option<SecretString>) -> Result<Self> {
        let kind = ProviderKind::GitLab;
        Ok(Self {
            api: http::api_client(kind)?,
            download: http::archive_client(kind, true)?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Projects are addressed by their URL-encoded full path.
    fn project_url(&self, slug: &str) -> String {
        format!(
            "{}/projects/{}",
            self.api_url,
            urlencoding::encode(slug.trim_matches('/'))
        )
    }
}

#[async_trait]
impl GitProvider for GitLabProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitLab
    }

    async fn default_branch(&self, slug: &str) -> Result<String> {
        let request = http::authorize(self.api.get(self.project_url(slug)), self.token.as_ref());
        let response = http::send(self.kind(), request, "Project lookup").await?;
        let response = http::check_status(self.kind(), slug, response, "Project lookup").await?;

        let info: ProjectInfo = response
            .json()
            .await
            .map_err(|e| ScanError::ProviderUnavailable {
                provider: self.kind(),
                message: format!("Failed to parse project metadata: {}", e),
            })?;
        info.default_branch.ok_or_else(|| ScanError::RepositoryNotFound {
            provider: self.kind(),
            slug: slug.to_string(),
        })
    }

    async fn archive_stream(&self, slug: &str, git_ref: &str) -> Result<ArchiveStream> {
        let url = format!("{}/repository/archive.zip", self.project_url(slug));
        let request = http::authorize(
            self.download.get(&url).query(&[("sha", git_ref)]),
            self.token.as_ref(),
        );
        let response = http::send(self.kind(), request, "Archive download").await?;
        let response = http::check_status(self.kind(), slug, response, "Archive download").await?;
        Ok(http::into_archive_stream(self.kind(), response))
    }
}
