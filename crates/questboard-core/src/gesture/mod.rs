//! Hold-to-confirm gesture engine.
//!
//! Progress is always derived from a monotonic clock reading, never
//! accumulated from frame deltas, so dropped or late frames only affect
//! how often the control is sampled, not what it reports.

mod clock;
mod config;
mod control;
mod decay;
mod feedback;
mod guard;
mod phase;
mod session;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{GestureConfig, GesturePreset};
pub use control::{
    CommitStatus, ControlState, ControlView, HoldControl, Input, Rejection, ReleaseReason,
    Transition,
};
pub use decay::CancellationDecay;
pub use feedback::{FeedbackSink, NoFeedback, RecordedFeedback};
pub use guard::CompletionGuard;
pub use phase::{classify, classify_cancelling, Phase, PhaseThresholds};
pub use session::{GestureSession, SessionId};
