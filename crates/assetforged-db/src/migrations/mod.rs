//! Registry schema upgrades.
//!
//! Schema steps are compiled into the binary and recorded in the
//! `registry_schema` table once applied, so opening an existing registry
//! only runs the steps it has not seen.

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Registry schema error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema step {version} ({name}) failed: {reason}")]
    Step {
        version: u32,
        name: &'static str,
        reason: String,
    },
}

/// Schema steps as (version, name, sql), in ascending version order.
const STEPS: &[(u32, &str, &str)] = &[(1, "attachments", include_str!("001_initial.sql"))];

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS registry_schema (
    version INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

fn recorded_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("SELECT MAX(version) FROM registry_schema", [], |row| {
        row.get::<_, Option<u32>>(0)
    })
    .optional()
    .map(|v| v.flatten().unwrap_or(0))
}

/// Bring the registry schema up to date.
///
/// Each outstanding step runs in its own transaction together with its
/// version record. Returns how many steps were applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    conn.execute(VERSION_TABLE, [])?;
    let from = recorded_version(conn)?;

    let mut applied = 0;
    for &(version, name, sql) in STEPS.iter().filter(|(v, _, _)| *v > from) {
        let step_failed = |e: rusqlite::Error| MigrationError::Step {
            version,
            name,
            reason: e.to_string(),
        };

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(step_failed)?;
        tx.execute(
            "INSERT INTO registry_schema (version, name) VALUES (?1, ?2)",
            rusqlite::params![version, name],
        )
        .map_err(step_failed)?;
        tx.commit().map_err(step_failed)?;

        applied += 1;
    }

    if applied > 0 {
        tracing::info!(
            "Registry schema upgraded from version {} to {} ({} step(s))",
            from,
            schema_version(),
            applied
        );
    }
    Ok(applied)
}

/// Version recorded in an open registry; 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32, MigrationError> {
    conn.execute(VERSION_TABLE, [])?;
    Ok(recorded_version(conn)?)
}

/// Version this build of the registry expects.
pub fn schema_version() -> u32 {
    STEPS.last().map(|&(v, _, _)| v).unwrap_or(0)
}
