use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::guard::CompletionGuard;

/// Identity of one press-to-release interaction on a control.
///
/// Ids increase per control; commit outcomes carry the id of the session
/// that produced them so a late result can be matched or discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Ephemeral state of one hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureSession {
    id: SessionId,
    started_at_ms: u64,
    required_duration_ms: u64,
    /// Generated at `begin()` and sent with every commit attempt of this
    /// session, so a retried commit is recognised as a duplicate.
    idempotency_key: String,
    guard: CompletionGuard,
}

impl GestureSession {
    pub fn new(id: SessionId, started_at_ms: u64, required_duration_ms: u64) -> Self {
        Self {
            id,
            started_at_ms,
            required_duration_ms: required_duration_ms.max(1),
            idempotency_key: format!("hold-{}", Uuid::new_v4()),
            guard: CompletionGuard::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    pub fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }

    /// `clamp((now - start) / required, 0, 1)`.
    pub fn progress_at(&self, now_ms: u64) -> f64 {
        let elapsed = now_ms.saturating_sub(self.started_at_ms) as f64;
        (elapsed / self.required_duration_ms as f64).clamp(0.0, 1.0)
    }

    pub(crate) fn try_complete(&mut self) -> bool {
        self.guard.try_complete()
    }
}
