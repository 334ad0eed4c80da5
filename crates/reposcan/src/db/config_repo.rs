//! Repository config persistence for the `repository_configs` table.
//!
//! One row per repository. A scan replaces the detected columns of the row.
//! `created_at` and `user_test_folder_preference` are only written on insert;
//! afterwards the preference changes solely through
//! [`set_user_test_folder_preference`].

use std::collections::BTreeMap;

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Database, DatabaseError};
use crate::detect::DetectedFramework;
use crate::infer::{Conventions, TestType};

/// Stored test configuration of one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    pub repository_id: String,
    pub test_frameworks: Vec<DetectedFramework>,
    pub test_folder_patterns: BTreeMap<String, Vec<String>>,
    pub test_file_naming_convention: BTreeMap<String, Vec<String>>,
    pub coverage_folder_path: String,
    /// User-supplied override. Detection never produces it.
    pub user_test_folder_preference: Option<serde_json::Value>,
    pub test_type_handling: BTreeMap<TestType, String>,
    pub feature_domain_based_test: bool,
    pub external_test_repo: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl RepositoryConfig {
    /// Builds the config a scan produces. `now` fills both timestamps; the
    /// stored `created_at` wins on upsert.
    pub fn from_scan(
        repository_id: &str,
        frameworks: Vec<DetectedFramework>,
        conventions: Conventions,
        user_test_folder_preference: Option<serde_json::Value>,
        now: &str,
    ) -> Self {
        Self {
            repository_id: repository_id.to_string(),
            test_frameworks: frameworks,
            test_folder_patterns: conventions.folder_patterns,
            test_file_naming_convention: conventions.naming_conventions,
            coverage_folder_path: conventions.coverage_folder,
            user_test_folder_preference,
            test_type_handling: conventions.type_handling,
            feature_domain_based_test: conventions.feature_domain_based,
            external_test_repo: conventions.external_test_repo,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let preference: Option<String> = row.get("user_test_folder_preference")?;
        let handling: Option<String> = row.get("test_type_handling")?;
        let coverage: Option<String> = row.get("coverage_folder_path")?;

        Ok(Self {
            repository_id: row.get("repository_id")?,
            test_frameworks: json_column(row, "test_frameworks")?,
            test_folder_patterns: json_column(row, "test_folder_patterns")?,
            test_file_naming_convention: json_column(row, "test_file_naming_convention")?,
            coverage_folder_path: coverage.unwrap_or_default(),
            user_test_folder_preference: match preference {
                Some(text) => Some(decode(row, "user_test_folder_preference", &text)?),
                None => None,
            },
            test_type_handling: match handling {
                Some(text) => decode(row, "test_type_handling", &text)?,
                None => BTreeMap::new(),
            },
            feature_domain_based_test: row.get("feature_domain_based_test")?,
            external_test_repo: row.get("external_test_repo")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> Result<T, rusqlite::Error> {
    let text: String = row.get(column)?;
    decode(row, column, &text)
}

fn decode<T: DeserializeOwned>(row: &Row<'_>, column: &str, text: &str) -> Result<T, rusqlite::Error> {
    serde_json::from_str(text).map_err(|e| {
        let idx = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn encode<T: Serialize>(column: &'static str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Json { column, source: e })
}

/// Finds the config for a repository.
pub fn find_by_repository_id(
    db: &Database,
    repository_id: &str,
) -> Result<Option<RepositoryConfig>, DatabaseError> {
    db.with_conn(|conn| {
        let config = conn
            .query_row(
                "SELECT * FROM repository_configs WHERE repository_id = ?1",
                params![repository_id],
                RepositoryConfig::from_row,
            )
            .optional()?;
        Ok(config)
    })
}

/// Inserts the config, or replaces the detected columns of the stored row.
/// On conflict the stored `created_at` and user preference are kept.
pub fn upsert(db: &Database, config: &RepositoryConfig) -> Result<(), DatabaseError> {
    let frameworks = encode("test_frameworks", &config.test_frameworks)?;
    let folders = encode("test_folder_patterns", &config.test_folder_patterns)?;
    let naming = encode("test_file_naming_convention", &config.test_file_naming_convention)?;
    let handling = encode("test_type_handling", &config.test_type_handling)?;
    let preference = config
        .user_test_folder_preference
        .as_ref()
        .map(|value| encode("user_test_folder_preference", value))
        .transpose()?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO repository_configs (repository_id, test_frameworks, test_folder_patterns,
             test_file_naming_convention, coverage_folder_path, user_test_folder_preference,
             test_type_handling, feature_domain_based_test, external_test_repo,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(repository_id) DO UPDATE SET
                test_frameworks = excluded.test_frameworks,
                test_folder_patterns = excluded.test_folder_patterns,
                test_file_naming_convention = excluded.test_file_naming_convention,
                coverage_folder_path = excluded.coverage_folder_path,
                test_type_handling = excluded.test_type_handling,
                feature_domain_based_test = excluded.feature_domain_based_test,
                external_test_repo = excluded.external_test_repo,
                updated_at = excluded.updated_at",
            params![
                config.repository_id,
                frameworks,
                folders,
                naming,
                config.coverage_folder_path,
                preference,
                handling,
                config.feature_domain_based_test,
                config.external_test_repo,
                config.created_at,
                config.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Sets or clears the user's test-folder preference on an existing config.
/// Returns false when the repository has no config yet.
pub fn set_user_test_folder_preference(
    db: &Database,
    repository_id: &str,
    preference: Option<&serde_json::Value>,
    now: &str,
) -> Result<bool, DatabaseError> {
    let encoded = preference
        .map(|value| encode("user_test_folder_preference", value))
        .transpose()?;

    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE repository_configs SET user_test_folder_preference = ?1, updated_at = ?2
             WHERE repository_id = ?3",
            params![encoded, now, repository_id],
        )?;
        Ok(changed > 0)
    })
}
