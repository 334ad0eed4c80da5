use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::circuit_breaker::BreakerSettings;
use crate::error::ConfigError;
use crate::provider::{ProviderKind, GITHUB_API_URL, GITLAB_API_URL};
use crate::secrets;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Defaults to `~/.reposcan/data/reposcan.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_stale_workdir_max_age_secs")]
    pub stale_workdir_max_age_secs: u64,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("reposcan")
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_stale_workdir_max_age_secs() -> u64 {
    6 * 60 * 60
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            scratch_dir: default_scratch_dir(),
            worker_count: default_worker_count(),
            poll_interval_ms: default_poll_interval_ms(),
            stale_workdir_max_age_secs: default_stale_workdir_max_age_secs(),
            providers: ProvidersConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::db::default_database_path().ok_or_else(|| ConfigError::Validation {
                message: "Cannot determine home directory for the default database path"
                    .to_string(),
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stale_workdir_max_age(&self) -> Duration {
        Duration::from_secs(self.stale_workdir_max_age_secs)
    }

    pub fn breaker_settings(&self) -> BreakerSettings {
        BreakerSettings {
            max_failures: self.circuit_breaker.max_failures,
            retry_attempts: self.circuit_breaker.retry_attempts,
            cool_down: Duration::from_secs(self.circuit_breaker.cool_down_secs),
            backoff_unit: Duration::from_millis(self.circuit_breaker.backoff_unit_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProvidersConfig")]
pub struct ProvidersConfig {
    pub github: ProviderConfig,
    pub gitlab: ProviderConfig,
}

/// Provider sections as written. A section without `api_url` keeps the
/// provider's public endpoint.
#[derive(Deserialize)]
struct RawProvidersConfig {
    #[serde(default = "ProviderConfig::github")]
    github: ProviderConfig,
    #[serde(default = "ProviderConfig::gitlab")]
    gitlab: ProviderConfig,
}

impl From<RawProvidersConfig> for ProvidersConfig {
    fn from(raw: RawProvidersConfig) -> Self {
        Self {
            github: raw.github.or_default_url(GITHUB_API_URL),
            gitlab: raw.gitlab.or_default_url(GITLAB_API_URL),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            github: ProviderConfig::github(),
            gitlab: ProviderConfig::gitlab(),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
        match kind {
            ProviderKind::GitHub => &self.github,
            ProviderKind::GitLab => &self.gitlab,
        }
    }
}

/// Connection settings for one provider. A token is optional; public
/// repositories download without one.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default)]
    pub token_env: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    pub fn github() -> Self {
        Self::with_url(GITHUB_API_URL, "GITHUB_TOKEN")
    }

    pub fn gitlab() -> Self {
        Self::with_url(GITLAB_API_URL, "GITLAB_TOKEN")
    }

    fn with_url(api_url: &str, token_env: &str) -> Self {
        Self {
            enabled: true,
            api_url: api_url.to_string(),
            token: None,
            token_file: None,
            token_env: Some(token_env.to_string()),
        }
    }

    fn or_default_url(mut self, api_url: &str) -> Self {
        if self.api_url.trim().is_empty() {
            self.api_url = api_url.to_string();
        }
        self
    }

    /// Resolves the token. A configured env var that is not set means "no
    /// token", since the default config names one for every provider.
    pub fn resolve_token(&self, kind: ProviderKind) -> Result<Option<SecretString>, ConfigError> {
        match secrets::resolve_secret_optional(
            self.token.as_deref(),
            self.token_file.as_deref(),
            self.token_env.as_deref(),
        ) {
            Ok(token) => Ok(token),
            Err(secrets::SecretError::EnvVarNotSet { .. }) => Ok(None),
            Err(e) => Err(ConfigError::Secret {
                provider: kind,
                source: e,
            }),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("enabled", &self.enabled)
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "****"))
            .field("token_file", &self.token_file)
            .field("token_env", &self.token_env)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_cool_down_secs")]
    pub cool_down_secs: u64,
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

fn default_max_failures() -> u32 {
    5
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_cool_down_secs() -> u64 {
    30
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            retry_attempts: default_retry_attempts(),
            cool_down_secs: default_cool_down_secs(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_breaker_defaults_match_settings_defaults() {
        assert_eq!(ScanConfig::default().breaker_settings(), BreakerSettings::default());
    }

    #[test]
    fn test_debug_hides_token() {
        let mut config = ProviderConfig::github();
        config.token = Some("ghp_secret".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("****"));
    }

    #[test]
    fn test_resolve_direct_token() {
        let mut config = ProviderConfig::gitlab();
        config.token = Some("glpat-123".to_string());
        let token = config.resolve_token(ProviderKind::GitLab).unwrap().unwrap();
        assert_eq!(token.expose_secret(), "glpat-123");
    }

    #[test]
    fn test_unset_env_means_no_token() {
        let mut config = ProviderConfig::github();
        config.token_env = Some("REPOSCAN_SCHEMA_TEST_UNSET".to_string());
        assert!(config.resolve_token(ProviderKind::GitHub).unwrap().is_none());
    }

    #[test]
    fn test_unreadable_token_file_is_error() {
        let mut config = ProviderConfig::github();
        config.token_file = Some("/nonexistent/reposcan/token".to_string());
        assert!(matches!(
            config.resolve_token(ProviderKind::GitHub),
            Err(ConfigError::Secret { .. })
        ));
    }
}
