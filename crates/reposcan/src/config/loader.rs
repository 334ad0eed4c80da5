use std::path::Path;

use crate::config::schema::ScanConfig;
use crate::error::ConfigError;
use crate::provider::ProviderKind;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ScanConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ScanConfig, ConfigError> {
    // An empty file means "all defaults".
    let config: ScanConfig = if content.trim().is_empty() {
        ScanConfig::default()
    } else {
        serde_yaml::from_str(content)?
    };

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &ScanConfig) -> Result<(), ConfigError> {
    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }
    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "poll_interval_ms must be greater than 0".to_string(),
        });
    }
    if config.circuit_breaker.retry_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "circuit_breaker.retry_attempts must be at least 1".to_string(),
        });
    }
    if config.circuit_breaker.max_failures == 0 {
        return Err(ConfigError::Validation {
            message: "circuit_breaker.max_failures must be at least 1".to_string(),
        });
    }
    if config.scratch_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation {
            message: "scratch_dir must not be empty".to_string(),
        });
    }

    for kind in ProviderKind::ALL {
        let provider = config.providers.get(kind);
        if !provider.enabled {
            continue;
        }
        let url = provider.api_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Validation {
                message: format!("providers.{}.api_url must not be empty", kind),
            });
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation {
                message: format!("providers.{}.api_url must be an http(s) URL", kind),
            });
        }
    }

    Ok(())
}
