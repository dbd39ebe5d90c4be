//! # Questboard Core Library
//!
//! Core logic behind the questboard hold-to-confirm controls and the
//! streak ledgers they advance. The `questboard-cli` binary drives every
//! operation here; a UI layer is expected to be a thin shell over the same
//! library.
//!
//! ## Architecture
//!
//! - **Gesture**: A monotonic-clock state machine. The caller samples it
//!   on every frame and receives phase changes and at most one commit
//!   request per session
//! - **Commit**: Retried, idempotent delivery of confirmed sessions to a
//!   durable store, with outcomes tagged by session
//! - **Ledger**: Pure streak arithmetic over calendar dates
//! - **Storage**: SQLite ledger persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`HoldControl`]: Gesture state machine
//! - [`CommitDispatcher`]: Background commit delivery
//! - [`Database`]: Ledger persistence
//! - [`Config`]: Application configuration management

pub mod commit;
pub mod error;
pub mod events;
pub mod gesture;
pub mod ledger;
pub mod storage;

pub use commit::{
    CommitChannel, CommitDispatcher, CommitOutcome, CommitRequest, LedgerCommitChannel,
    RetryPolicy,
};
pub use error::{CommitError, ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::Event;
pub use gesture::{
    classify, CommitStatus, ControlView, GestureConfig, GesturePreset, HoldControl, Phase,
    PhaseThresholds, ReleaseReason, SessionId,
};
pub use ledger::{DayBoundary, LedgerState, LedgerUpdate, StreakLedger};
pub use storage::{Config, Database};
