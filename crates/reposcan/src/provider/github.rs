//! GitHub archive client.
//!
//! The zipball endpoint answers with a redirect to a short-lived download
//! URL. The redirect is resolved by hand so the bearer token is only ever sent
//! to the API host.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::Client;
use secrecy::SecretString;
use serde::Deserialize;

use super::http;
use super::{ArchiveStream, GitProvider, ProviderKind};
use crate::error::{Result, ScanError};
use crate::sanitize::redact_repo_url;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    default_branch: String,
}

pub struct GitHubProvider {
    api: Client,
    no_redirect: Client,
    download: Client,
    api_url: String,
    token: Option<SecretString>,
}

impl GitHubProvider {
    pub fn new(api_url: impl Into<String>, token: Option<SecretString>) -> Result<Self> {
        let kind = ProviderKind::GitHub;
        Ok(Self {
            api: http::api_client(kind)?,
            no_redirect: http::archive_client(kind, false)?,
            download: http::archive_client(kind, true)?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn repo_url(&self, slug: &str) -> String {
        format!("{}/repos/{}", self.api_url, slug.trim_matches('/'))
    }
}

#[async_trait]
impl GitProvider for GitHubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn default_branch(&self, slug: &str) -> Result<String> {
        let request = http::authorize(
            self.api.get(self.repo_url(slug)).header(ACCEPT, GITHUB_JSON),
            self.token.as_ref(),
        );
        let response = http::send(self.kind(), request, "Repository lookup").await?;
        let response = http::check_status(self.kind(), slug, response, "Repository lookup").await?;

        let info: RepositoryInfo =
            response
                .json()
                .await
                .map_err(|e| ScanError::ProviderUnavailable {
                    provider: self.kind(),
                    message: format!("Failed to parse repository metadata: {}", e),
                })?;
        Ok(info.default_branch)
    }

    async fn archive_stream(&self, slug: &str, git_ref: &str) -> Result<ArchiveStream> {
        let url = format!(
            "{}/zipball/{}",
            self.repo_url(slug),
            urlencoding::encode(git_ref)
        );
        let request = http::authorize(
            self.no_redirect.get(&url).header(ACCEPT, GITHUB_JSON),
            self.token.as_ref(),
        );
        let response = http::send(self.kind(), request, "Archive request").await?;

        if !response.status().is_redirection() {
            // Some GitHub-compatible servers serve the ZIP directly.
            let response =
                http::check_status(self.kind(), slug, response, "Archive request").await?;
            return Ok(http::into_archive_stream(self.kind(), response));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ScanError::ProviderUnavailable {
                provider: self.kind(),
                message: "Archive redirect without a Location header".to_string(),
            })?;
        debug!("Resolved archive for {} to {}", slug, redact_repo_url(&location));

        let response = http::send(self.kind(), self.download.get(&location), "Archive download").await?;
        let response = http::check_status(self.kind(), slug, response, "Archive download").await?;
        Ok(http::into_archive_stream(self.kind(), response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_url_trims_slashes() {
        let provider = GitHubProvider::new("https://api.github.com/", None).unwrap();
        assert_eq!(
            provider.repo_url("/acme/widgets/"),
            "https://api.github.com/repos/acme/widgets"
        );
        assert_eq!(provider.kind(), ProviderKind::GitHub);
    }
}
