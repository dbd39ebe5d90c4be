//! Durable commit of a confirmed gesture.
//!
//! A [`CommitChannel`] performs the side effect (grant a purchase, advance
//! a streak) and returns the resulting ledger snapshot. Channels are
//! synchronous; [`CommitDispatcher`] runs them off the interaction loop,
//! retries with backoff and reports session-tagged [`CommitOutcome`]s.
//!
//! Every attempt for one session carries the same idempotency key, so a
//! retry after an ambiguous failure is a duplicate from the store's view.

mod dispatcher;
mod ledger_channel;

pub use dispatcher::{commit_with_retry, CommitDispatcher};
pub use ledger_channel::LedgerCommitChannel;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CommitError;
use crate::gesture::SessionId;
use crate::ledger::LedgerState;

/// What the control hands to the commit channel once a hold confirms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub session_id: SessionId,
    pub idempotency_key: String,
    /// Call-site data (item id, ritual name, ...). Opaque to the core.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Result of a commit, tagged with the session that issued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub session_id: SessionId,
    pub idempotency_key: String,
    pub attempts: u32,
    pub result: Result<LedgerState, CommitError>,
}

/// The durable side of a hold-to-confirm control.
pub trait CommitChannel: Send + Sync {
    /// Human-readable binding name, used in logs.
    fn name(&self) -> &str;

    /// Perform the side effect. Must be idempotent per `request.idempotency_key`.
    fn commit(&self, request: &CommitRequest) -> Result<LedgerState, CommitError>;
}

/// Exponential backoff for retryable commit failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// An attempt still running after this long is reported as a timeout
    /// and retried; its late result is absorbed by the idempotency key.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            attempt_timeout_ms: 3_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let raw = self.initial_backoff_ms as f64 * self.backoff_multiplier.max(1.0).powi(exponent);
        let capped = raw.min(self.max_backoff_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}
