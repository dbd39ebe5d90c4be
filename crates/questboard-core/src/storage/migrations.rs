//! Database schema migrations for questboard.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{debug, warn};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!("failed to read schema_version: {e}");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: streak ledgers, one row per user per ledger key.
///
/// `last_completion_date` is a plain `YYYY-MM-DD` calendar date, not a timestamp.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS streak_ledgers (
            user_id              TEXT NOT NULL,
            ledger_key           TEXT NOT NULL,
            last_completion_date TEXT,
            current_streak       INTEGER NOT NULL DEFAULT 0,
            longest_streak       INTEGER NOT NULL DEFAULT 0,
            total_completions    INTEGER NOT NULL DEFAULT 0,
            updated_at           TEXT NOT NULL,
            PRIMARY KEY (user_id, ledger_key),
            CHECK (longest_streak >= current_streak)
        );

        CREATE INDEX IF NOT EXISTS idx_streak_ledgers_user ON streak_ledgers(user_id);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()?;
    debug!("applied migration v1");
    Ok(())
}

/// Migration v2: commit receipts keyed by idempotency key.
///
/// A replayed key returns the stored snapshot instead of touching the ledger.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS commit_receipts (
            idempotency_key TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL,
            ledger_key      TEXT NOT NULL,
            completion_date TEXT NOT NULL,
            applied         INTEGER NOT NULL,
            snapshot_json   TEXT NOT NULL,
            recorded_at     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_commit_receipts_ledger
            ON commit_receipts(user_id, ledger_key);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()?;
    debug!("applied migration v2");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrates_fresh_database_to_latest() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(tables.contains(&"streak_ledgers".to_string()));
        assert!(tables.contains(&"commit_receipts".to_string()));
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }
}
