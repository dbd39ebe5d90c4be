//! SQLite-based ledger storage.
//!
//! Provides persistent storage for:
//! - Streak ledgers (one per user per ledger key)
//! - Commit receipts keyed by idempotency key
//!
//! Ledger rows are created lazily by the first completion. Reads never
//! create or modify rows.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use super::{data_dir, migrations};
use crate::error::DatabaseError;
use crate::ledger::{LedgerState, LedgerUpdate, StreakLedger};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite database for streak ledgers.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data_dir>/questboard.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&dir.join("questboard.db"))
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(std::time::Duration::from_secs(2))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        migrations::migrate(&self.conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Load a ledger. `None` if it has never been completed.
    pub fn ledger(&self, user_id: &str, ledger_key: &str) -> Result<Option<StreakLedger>, DatabaseError> {
        let raw = self
            .conn
            .query_row(
                "SELECT user_id, ledger_key, last_completion_date, current_streak,
                        longest_streak, total_completions, updated_at
                 FROM streak_ledgers
                 WHERE user_id = ?1 AND ledger_key = ?2",
                params![user_id, ledger_key],
                RawLedger::from_row,
            )
            .optional()?;
        raw.map(RawLedger::into_ledger).transpose()
    }

    /// Load a ledger, or the zero record if it does not exist yet.
    pub fn ledger_or_default(&self, user_id: &str, ledger_key: &str) -> Result<StreakLedger, DatabaseError> {
        Ok(self
            .ledger(user_id, ledger_key)?
            .unwrap_or_else(|| StreakLedger::empty(user_id, ledger_key)))
    }

    /// All ledgers of a user, ordered by key.
    pub fn ledgers_for_user(&self, user_id: &str) -> Result<Vec<StreakLedger>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, ledger_key, last_completion_date, current_streak,
                    longest_streak, total_completions, updated_at
             FROM streak_ledgers
             WHERE user_id = ?1
             ORDER BY ledger_key",
        )?;
        let rows = stmt.query_map(params![user_id], RawLedger::from_row)?;

        let mut ledgers = Vec::new();
        for row in rows {
            ledgers.push(row?.into_ledger()?);
        }
        Ok(ledgers)
    }

    /// Number of stored commit receipts for a ledger.
    pub fn receipt_count(&self, user_id: &str, ledger_key: &str) -> Result<u64, DatabaseError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM commit_receipts WHERE user_id = ?1 AND ledger_key = ?2",
            params![user_id, ledger_key],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(count)
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Record a completion on `today` for a ledger.
    ///
    /// Same-day duplicates leave the ledger untouched and return
    /// `applied: false`. Runs in one immediate transaction, so concurrent
    /// writers on the same file serialize.
    pub fn record_completion(
        &mut self,
        user_id: &str,
        ledger_key: &str,
        today: NaiveDate,
    ) -> Result<LedgerUpdate, DatabaseError> {
        self.apply_completion(None, user_id, ledger_key, today)
    }

    /// Like [`record_completion`](Self::record_completion), guarded by an
    /// idempotency key. Replaying a key returns the update stored by the
    /// first call without touching the ledger again, even on a later day.
    ///
    /// # Errors
    /// `CorruptRow` if the key was already used for a different ledger.
    pub fn record_completion_once(
        &mut self,
        idempotency_key: &str,
        user_id: &str,
        ledger_key: &str,
        today: NaiveDate,
    ) -> Result<LedgerUpdate, DatabaseError> {
        self.apply_completion(Some(idempotency_key), user_id, ledger_key, today)
    }

    fn apply_completion(
        &mut self,
        idempotency_key: Option<&str>,
        user_id: &str,
        ledger_key: &str,
        today: NaiveDate,
    ) -> Result<LedgerUpdate, DatabaseError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(key) = idempotency_key {
            let receipt = tx
                .query_row(
                    "SELECT user_id, ledger_key, applied, snapshot_json
                     FROM commit_receipts WHERE idempotency_key = ?1",
                    params![key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, bool>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            if let Some((r_user, r_ledger, applied, snapshot)) = receipt {
                if r_user != user_id || r_ledger != ledger_key {
                    return Err(DatabaseError::CorruptRow {
                        table: "commit_receipts".into(),
                        message: format!(
                            "idempotency key {key} belongs to {r_user}/{r_ledger}, not {user_id}/{ledger_key}"
                        ),
                    });
                }
                let state: LedgerState =
                    serde_json::from_str(&snapshot).map_err(|e| DatabaseError::CorruptRow {
                        table: "commit_receipts".into(),
                        message: e.to_string(),
                    })?;
                debug!(user_id, ledger_key, key, "replayed commit receipt");
                return Ok(LedgerUpdate { state, applied });
            }
        }

        let current = tx
            .query_row(
                "SELECT user_id, ledger_key, last_completion_date, current_streak,
                        longest_streak, total_completions, updated_at
                 FROM streak_ledgers
                 WHERE user_id = ?1 AND ledger_key = ?2",
                params![user_id, ledger_key],
                RawLedger::from_row,
            )
            .optional()?
            .map(RawLedger::into_ledger)
            .transpose()?
            .map(|ledger| ledger.state)
            .unwrap_or_default();

        let update = current.apply_completion(today);
        let now = Utc::now().to_rfc3339();

        if update.applied {
            tx.execute(
                "INSERT INTO streak_ledgers
                    (user_id, ledger_key, last_completion_date, current_streak,
                     longest_streak, total_completions, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(user_id, ledger_key) DO UPDATE SET
                    last_completion_date = excluded.last_completion_date,
                    current_streak       = excluded.current_streak,
                    longest_streak       = excluded.longest_streak,
                    total_completions    = excluded.total_completions,
                    updated_at           = excluded.updated_at",
                params![
                    user_id,
                    ledger_key,
                    update.state.last_completion_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    update.state.current_streak,
                    update.state.longest_streak,
                    update.state.total_completions,
                    now,
                ],
            )?;
        }

        if let Some(key) = idempotency_key {
            let snapshot = serde_json::to_string(&update.state)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            tx.execute(
                "INSERT INTO commit_receipts
                    (idempotency_key, user_id, ledger_key, completion_date, applied,
                     snapshot_json, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    key,
                    user_id,
                    ledger_key,
                    today.format(DATE_FORMAT).to_string(),
                    update.applied,
                    snapshot,
                    now,
                ],
            )?;
        }

        tx.commit()?;

        if update.applied {
            info!(
                user_id,
                ledger_key,
                %today,
                current_streak = update.state.current_streak,
                longest_streak = update.state.longest_streak,
                "completion recorded"
            );
        } else {
            debug!(user_id, ledger_key, %today, "completion already recorded for day");
        }
        Ok(update)
    }
}

/// Column values as stored, before date parsing.
struct RawLedger {
    user_id: String,
    ledger_key: String,
    last_completion_date: Option<String>,
    current_streak: u32,
    longest_streak: u32,
    total_completions: u64,
    updated_at: String,
}

impl RawLedger {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            ledger_key: row.get(1)?,
            last_completion_date: row.get(2)?,
            current_streak: row.get(3)?,
            longest_streak: row.get(4)?,
            total_completions: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_ledger(self) -> Result<StreakLedger, DatabaseError> {
        let corrupt = |message: String| DatabaseError::CorruptRow {
            table: "streak_ledgers".into(),
            message,
        };

        let last_completion_date = self
            .last_completion_date
            .as_deref()
            .map(|s| NaiveDate::parse_from_str(s, DATE_FORMAT))
            .transpose()
            .map_err(|e| corrupt(format!("last_completion_date: {e}")))?;

        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .ok();

        Ok(StreakLedger {
            user_id: self.user_id,
            ledger_key: self.ledger_key,
            state: LedgerState {
                last_completion_date,
                current_streak: self.current_streak,
                longest_streak: self.longest_streak,
                total_completions: self.total_completions,
            },
            updated_at,
        })
    }
}
