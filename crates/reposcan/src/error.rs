use std::path::PathBuf;
use thiserror::Error;

use crate::provider::ProviderKind;

/// Errors that abort a scan job or reject a queue operation.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Provider {provider} unavailable: {message}")]
    ProviderUnavailable {
        provider: ProviderKind,
        message: String,
    },

    #[error("Repository '{slug}' not found on {provider}")]
    RepositoryNotFound { provider: ProviderKind, slug: String },

    #[error("Repository '{0}' is not registered")]
    RepositoryUnknown(String),

    #[error("Archive corrupt: {0}")]
    ArchiveCorrupt(String),

    #[error("Circuit open for {provider}, retry in {retry_in_ms}ms")]
    CircuitOpen {
        provider: ProviderKind,
        retry_in_ms: u64,
    },

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ScanError {
    /// Only provider outages are worth retrying; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::ProviderUnavailable { .. })
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(e: tokio::task::JoinError) -> Self {
        ScanError::Task(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove directory '{path}': {source}")]
    RemoveDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Secret for provider {provider} could not be resolved: {source}")]
    Secret {
        provider: ProviderKind,
        #[source]
        source: crate::secrets::SecretError,
    },
}

pub type Result<T> = std::result::Result<T, ScanError>;
