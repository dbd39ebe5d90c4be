use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{CommitChannel, CommitRequest};
use crate::error::CommitError;
use crate::ledger::{DayBoundary, LedgerState};
use crate::storage::Database;

/// Commit channel that advances one user's streak ledger.
///
/// The ledger day is derived here, on the store side, through the
/// configured [`DayBoundary`]; the caller's local date is never consulted.
pub struct LedgerCommitChannel {
    db: Mutex<Database>,
    user_id: String,
    ledger_key: String,
    boundary: DayBoundary,
    name: String,
}

impl LedgerCommitChannel {
    pub fn new(
        db: Database,
        user_id: impl Into<String>,
        ledger_key: impl Into<String>,
        boundary: DayBoundary,
    ) -> Self {
        let user_id = user_id.into();
        let ledger_key = ledger_key.into();
        Self {
            name: format!("ledger:{ledger_key}"),
            db: Mutex::new(db),
            user_id,
            ledger_key,
            boundary,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn ledger_key(&self) -> &str {
        &self.ledger_key
    }

    /// Current ledger state without modifying it.
    pub fn snapshot(&self) -> Result<LedgerState, CommitError> {
        let db = self.lock()?;
        Ok(db.ledger_or_default(&self.user_id, &self.ledger_key)?.state)
    }

    // Poison never clears, so it is reported as a final failure.
    fn lock(&self) -> Result<MutexGuard<'_, Database>, CommitError> {
        self.db
            .lock()
            .map_err(|_| CommitError::Rejected("ledger store lock poisoned".into()))
    }
}

impl CommitChannel for LedgerCommitChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn commit(&self, request: &CommitRequest) -> Result<LedgerState, CommitError> {
        let today = self.boundary.today();
        let mut db = self.lock()?;
        let update = db.record_completion_once(
            &request.idempotency_key,
            &self.user_id,
            &self.ledger_key,
            today,
        )?;
        debug!(
            session = %request.session_id,
            applied = update.applied,
            "ledger commit"
        );
        Ok(update.state)
    }
}
