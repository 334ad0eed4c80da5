//! Schema migrations.
//!
//! The schema version lives in SQLite's `user_version` pragma. Each step runs
//! in its own transaction together with the version bump, so a crash leaves
//! the database at the last completed step.

use rusqlite::{Connection, TransactionBehavior};

use super::error::DatabaseError;

enum Step {
    Sql(&'static str),
    /// Adds a column unless an older build already created it.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

/// Schema steps in order; step `n` moves the schema to version `n + 1`.
const STEPS: &[Step] = &[
    Step::Sql(include_str!("sql/001_create_repositories.sql")),
    Step::Sql(include_str!("sql/002_create_repository_configs.sql")),
    Step::Sql(include_str!("sql/003_create_scan_jobs.sql")),
    Step::AddColumn {
        table: "scan_jobs",
        column: "worker_id",
        definition: "INTEGER",
    },
];

/// Schema version a fully migrated database reports.
pub const SCHEMA_VERSION: u32 = STEPS.len() as u32;

pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Brings the schema up to [`SCHEMA_VERSION`].
pub fn run_all(conn: &mut Connection) -> Result<(), DatabaseError> {
    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(DatabaseError::Migration {
            version: current,
            reason: format!("database schema is newer than this build ({})", SCHEMA_VERSION),
        });
    }

    for (index, step) in STEPS.iter().enumerate().skip(current as usize) {
        let version = index as u32 + 1;
        let fail = |e: rusqlite::Error| DatabaseError::Migration {
            version,
            reason: e.to_string(),
        };

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(fail)?;
        match step {
            Step::Sql(sql) => tx.execute_batch(sql).map_err(fail)?,
            Step::AddColumn {
                table,
                column,
                definition,
            } => {
                if has_column(&tx, table, column)? {
                    log::debug!("Column {}.{} already present", table, column);
                } else {
                    tx.execute_batch(&format!(
                        "ALTER TABLE {} ADD COLUMN {} {}",
                        table, column, definition
                    ))
                    .map_err(fail)?;
                }
            }
        }
        tx.pragma_update(None, "user_version", version)
            .map_err(fail)?;
        tx.commit().map_err(fail)?;
        log::info!("Database schema migrated to v{}", version);
    }

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let mut stmt = conn.prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")?;
    Ok(stmt.exists(rusqlite::params![table, column])?)
}
