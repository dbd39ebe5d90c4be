use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommitError;
use crate::gesture::{Phase, ReleaseReason, SessionId};
use crate::ledger::LedgerState;

/// Coarse, declarative state changes of a hold control.
///
/// Emitted only on transitions (never per sample); the per-sample stream
/// goes through `FeedbackSink` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    GestureStarted {
        session_id: SessionId,
        required_duration_ms: u64,
        at: DateTime<Utc>,
    },
    PhaseChanged {
        session_id: Option<SessionId>,
        from: Phase,
        to: Phase,
        progress: f64,
        at: DateTime<Utc>,
    },
    /// Released before full progress; decay has taken over.
    GestureCancelled {
        session_id: SessionId,
        progress: f64,
        reason: ReleaseReason,
        at: DateTime<Utc>,
    },
    /// Decay reached zero; the control is idle again.
    GestureReset {
        session_id: SessionId,
        at: DateTime<Utc>,
    },
    GestureConfirmed {
        session_id: SessionId,
        idempotency_key: String,
        at: DateTime<Utc>,
    },
    CommitSucceeded {
        session_id: SessionId,
        state: LedgerState,
        attempts: u32,
        at: DateTime<Utc>,
    },
    /// Durable commit failed. The gesture stays confirmed.
    CommitFailed {
        session_id: SessionId,
        error: CommitError,
        retryable: bool,
        at: DateTime<Utc>,
    },
    CommitRetried {
        session_id: SessionId,
        at: DateTime<Utc>,
    },
    /// The surrounding application reported a commit in flight (or its end).
    CommitPendingSynced {
        pending: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Event::GestureStarted { session_id, .. }
            | Event::GestureCancelled { session_id, .. }
            | Event::GestureReset { session_id, .. }
            | Event::GestureConfirmed { session_id, .. }
            | Event::CommitSucceeded { session_id, .. }
            | Event::CommitFailed { session_id, .. }
            | Event::CommitRetried { session_id, .. } => Some(*session_id),
            Event::PhaseChanged { session_id, .. } => *session_id,
            Event::CommitPendingSynced { .. } => None,
        }
    }

    /// True for events that end a session's visible lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::GestureReset { .. }
                | Event::CommitSucceeded { .. }
                | Event::CommitFailed { .. }
        )
    }
}
