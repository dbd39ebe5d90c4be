//! Calendar-day streak ledger.
//!
//! One ledger exists per user per ledger key (the daily ritual, the
//! task-completion aggregate, ...). It changes only through
//! [`LedgerState::apply_completion`], which counts at most one completion
//! per calendar day:
//!
//! - last completion today (or later): no-op
//! - last completion yesterday: streak continues
//! - otherwise: streak restarts at 1

mod day;

pub use day::DayBoundary;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Ledger key for the daily ritual check-in.
pub const DAILY_RITUAL: &str = "daily_ritual";
/// Ledger key for the to-do completion streak.
pub const TASK_COMPLETION: &str = "task_completion";

/// Counters of one ledger. Default is the lazily created zero record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub last_completion_date: Option<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_completions: u64,
}

/// Result of applying one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerUpdate {
    pub state: LedgerState,
    /// `false` when the completion was a same-day duplicate and nothing changed.
    pub applied: bool,
}

impl LedgerState {
    /// Apply a completion on `today` without mutating `self`.
    ///
    /// A `today` earlier than the recorded date is treated like a same-day
    /// duplicate: the store's calendar only moves forward.
    pub fn apply_completion(&self, today: NaiveDate) -> LedgerUpdate {
        let continues = match self.last_completion_date {
            Some(last) if last >= today => {
                return LedgerUpdate {
                    state: *self,
                    applied: false,
                };
            }
            Some(last) => today.pred_opt() == Some(last),
            None => false,
        };

        let current_streak = if continues {
            self.current_streak.saturating_add(1)
        } else {
            1
        };

        LedgerUpdate {
            state: LedgerState {
                last_completion_date: Some(today),
                current_streak,
                longest_streak: self.longest_streak.max(current_streak),
                total_completions: self.total_completions.saturating_add(1),
            },
            applied: true,
        }
    }

    pub fn completed_on(&self, day: NaiveDate) -> bool {
        self.last_completion_date == Some(day)
    }

    /// Streak as it should be displayed on `today`: a streak whose last
    /// completion is older than yesterday is already broken, even though
    /// the stored counter only resets on the next completion.
    pub fn live_streak(&self, today: NaiveDate) -> u32 {
        match self.last_completion_date {
            Some(last) if last == today || today.pred_opt() == Some(last) => self.current_streak,
            _ => 0,
        }
    }
}

/// A persisted ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakLedger {
    pub user_id: String,
    pub ledger_key: String,
    #[serde(flatten)]
    pub state: LedgerState,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StreakLedger {
    /// Zero record, as created on first use.
    pub fn empty(user_id: impl Into<String>, ledger_key: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ledger_key: ledger_key.into(),
            state: LedgerState::default(),
            updated_at: None,
        }
    }

    pub fn completed_on(&self, day: NaiveDate) -> bool {
        self.state.completed_on(day)
    }
}
