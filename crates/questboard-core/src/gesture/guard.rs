use serde::{Deserialize, Serialize};

/// Single-flight latch for the transition into `Confirmed`.
///
/// `try_complete` returns `true` exactly once over the guard's lifetime,
/// however many samples observe full progress. There is no way to reset it;
/// a new session gets a new guard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionGuard {
    completed: bool,
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn try_complete(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        true
    }
}
