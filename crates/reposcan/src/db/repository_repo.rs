//! Repository lookups for the `repositories` table.
//!
//! Rows are owned by the sync pipeline; the scanner only reads them. `upsert`
//! exists so the CLI and tests can register repositories without that pipeline.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw repository row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryRow {
    pub id: String,
    pub name: String,
    pub full_path: String,
    pub provider: String,
    pub last_synced: String,
    pub monitored_branches: Vec<String>,
    pub open_pull_requests: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl RepositoryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let branches: String = row.get("monitored_branches")?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            full_path: row.get("full_path")?,
            provider: row.get("provider")?,
            last_synced: row.get("last_synced")?,
            // A malformed branch list is not worth failing a lookup over.
            monitored_branches: serde_json::from_str(&branches).unwrap_or_default(),
            open_pull_requests: row.get("open_pull_requests")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a repository, or refreshes every column except `created_at`.
pub fn upsert(db: &Database, repo: &RepositoryRow) -> Result<(), DatabaseError> {
    let branches =
        serde_json::to_string(&repo.monitored_branches).map_err(|e| DatabaseError::Json {
            column: "monitored_branches",
            source: e,
        })?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO repositories (id, name, full_path, provider, last_synced,
             monitored_branches, open_pull_requests, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                full_path = excluded.full_path,
                provider = excluded.provider,
                last_synced = excluded.last_synced,
                monitored_branches = excluded.monitored_branches,
                open_pull_requests = excluded.open_pull_requests,
                updated_at = excluded.updated_at",
            params![
                repo.id,
                repo.name,
                repo.full_path,
                repo.provider,
                repo.last_synced,
                branches,
                repo.open_pull_requests,
                repo.created_at,
                repo.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a repository by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<RepositoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM repositories WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], RepositoryRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists repositories for one provider, ordered by name.
pub fn list_by_provider(db: &Database, provider: &str) -> Result<Vec<RepositoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM repositories WHERE provider = ?1 ORDER BY name")?;
        let rows = stmt
            .query_map(params![provider], RepositoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
pub(crate) fn sample(id: &str, provider: &str, full_path: &str) -> RepositoryRow {
    RepositoryRow {
        id: id.to_string(),
        name: full_path.rsplit('/').next().unwrap_or(full_path).to_string(),
        full_path: full_path.to_string(),
        provider: provider.to_string(),
        last_synced: "2026-01-01T00:00:00Z".to_string(),
        monitored_branches: vec!["main".to_string()],
        open_pull_requests: 0,
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-01T00:00:00Z".to_string(),
    }
}
