//! HTTP plumbing shared by the provider clients.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use super::{ArchiveStream, ProviderKind};
use crate::error::{Result, ScanError};

/// Default connect timeout for provider requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for metadata requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Archives can be large; the whole download gets longer.
const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(600);

/// Maximum length for provider error bodies copied into error messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

const USER_AGENT: &str = concat!("reposcan/", env!("CARGO_PKG_VERSION"));

fn builder() -> reqwest::ClientBuilder {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
}

/// Client for metadata calls.
pub(super) fn api_client(provider: ProviderKind) -> Result<Client> {
    builder()
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| client_error(provider, e))
}

/// Client for archive downloads. With `follow_redirects` off, a 3xx comes
/// back to the caller instead of being chased.
pub(super) fn archive_client(provider: ProviderKind, follow_redirects: bool) -> Result<Client> {
    let policy = if follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };
    builder()
        .timeout(ARCHIVE_TIMEOUT)
        .redirect(policy)
        .build()
        .map_err(|e| client_error(provider, e))
}

fn client_error(provider: ProviderKind, e: reqwest::Error) -> ScanError {
    ScanError::ProviderUnavailable {
        provider,
        message: format!("Failed to create HTTP client: {}", e),
    }
}

pub(super) fn authorize(request: RequestBuilder, token: Option<&SecretString>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token.expose_secret()),
        None => request,
    }
}

/// Sends the request, mapping transport failures to `ProviderUnavailable`.
pub(super) async fn send(
    provider: ProviderKind,
    request: RequestBuilder,
    what: &str,
) -> Result<Response> {
    request.send().await.map_err(|e| ScanError::ProviderUnavailable {
        provider,
        message: format!("{} request failed: {}", what, e.without_url()),
    })
}

/// 2xx passes through, 404 is `RepositoryNotFound`, anything else is
/// `ProviderUnavailable` with a truncated body for context.
pub(super) async fn check_status(
    provider: ProviderKind,
    slug: &str,
    response: Response,
    what: &str,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ScanError::RepositoryNotFound {
            provider,
            slug: slug.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(ScanError::ProviderUnavailable {
        provider,
        message: format!("{} returned {}: {}", what, status, truncate(&body)),
    })
}

/// Wraps the response body as an archive stream.
pub(super) fn into_archive_stream(provider: ProviderKind, response: Response) -> ArchiveStream {
    response
        .bytes_stream()
        .map(move |chunk| {
            chunk.map_err(|e| ScanError::ProviderUnavailable {
                provider,
                message: format!("Archive download interrupted: {}", e.without_url()),
            })
        })
        .boxed()
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &body[..end])
}
