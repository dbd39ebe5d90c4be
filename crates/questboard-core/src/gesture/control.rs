//! Hold-to-confirm control.
//!
//! A single explicit state machine driven by one transition function,
//! [`HoldControl::handle`]. The caller owns the event loop: it feeds presses,
//! releases and periodic samples, dispatches the returned commit request,
//! and feeds the session-tagged outcome back.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Holding -> Confirmed
//!           |  ^
//!           v  |  (new press restarts from zero)
//!         Decaying -> Idle
//! ```
//!
//! `Confirmed` is terminal for its session. A new press starts a new
//! session; outcomes for older sessions are then ignored. The exception is
//! a retryable commit failure: presses are rejected until
//! [`HoldControl::retry_commit`] re-sends the same request.
//!
//! ## Usage
//!
//! ```ignore
//! let mut control = HoldControl::new(GestureConfig::purchase_confirm(), MonotonicClock::new());
//! control.begin();
//! // On every frame:
//! let t = control.sample();
//! if let Some(request) = t.commit {
//!     dispatcher.dispatch(request);
//! }
//! // When an outcome arrives:
//! control.resolve_commit(outcome);
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::clock::Clock;
use super::config::GestureConfig;
use super::decay::CancellationDecay;
use super::feedback::{FeedbackSink, NoFeedback};
use super::phase::{classify, classify_cancelling, Phase};
use super::session::{GestureSession, SessionId};
use crate::commit::{CommitOutcome, CommitRequest};
use crate::error::CommitError;
use crate::events::Event;
use crate::ledger::LedgerState;

/// Why a hold ended before confirming. All reasons share one cancellation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseReason {
    PointerUp,
    LeftBounds,
    CaptureLost,
}

/// Inputs accepted by [`HoldControl::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Press,
    Release(ReleaseReason),
    Sample,
    CommitResolved(CommitOutcome),
    /// External "a commit is in flight" signal, e.g. after a reload.
    PendingSync(bool),
    RetryCommit,
}

/// Why an input had no effect. Never user-visible on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    Disabled,
    SessionActive,
    NotHolding,
    AlreadyConfirmed,
    StaleCommit { session_id: SessionId },
    NothingToRetry,
}

/// Durable-commit status of a confirmed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitStatus {
    /// No confirmed session yet.
    NotStarted,
    InFlight,
    Succeeded { state: LedgerState },
    Failed { error: CommitError, retryable: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ControlState {
    Idle,
    Holding {
        session: GestureSession,
    },
    Decaying {
        session_id: SessionId,
        decay: CancellationDecay,
    },
    /// `session_id` is `None` when entered through an external pending signal.
    Confirmed {
        session_id: Option<SessionId>,
        request: Option<CommitRequest>,
        commit: CommitStatus,
    },
}

impl ControlState {
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            ControlState::Idle => None,
            ControlState::Holding { session } => Some(session.id()),
            ControlState::Decaying { session_id, .. } => Some(*session_id),
            ControlState::Confirmed { session_id, .. } => *session_id,
        }
    }
}

/// Result of one input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub events: Vec<Event>,
    /// Set exactly once per session, on the transition into `Confirmed`
    /// (and again on an explicit retry of the same request).
    pub commit: Option<CommitRequest>,
    pub rejected: Option<Rejection>,
}

impl Transition {
    fn rejected(reason: Rejection) -> Self {
        Self {
            rejected: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.is_some()
    }
}

/// Snapshot for the declarative render layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlView {
    pub phase: Phase,
    pub progress: f64,
    pub disabled: bool,
    pub session_id: Option<SessionId>,
    pub commit: CommitStatus,
}

pub struct HoldControl<C: Clock, F: FeedbackSink = NoFeedback> {
    config: GestureConfig,
    clock: C,
    feedback: F,
    state: ControlState,
    phase: Phase,
    progress: f64,
    disabled: bool,
    next_session: u64,
    payload: serde_json::Value,
}

impl<C: Clock> HoldControl<C, NoFeedback> {
    pub fn new(config: GestureConfig, clock: C) -> Self {
        Self::with_feedback(config, clock, NoFeedback)
    }
}

impl<C: Clock, F: FeedbackSink> HoldControl<C, F> {
    pub fn with_feedback(config: GestureConfig, clock: C, feedback: F) -> Self {
        Self {
            config,
            clock,
            feedback,
            state: ControlState::Idle,
            phase: Phase::Idle,
            progress: 0.0,
            disabled: false,
            next_session: 1,
            payload: serde_json::Value::Null,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn feedback(&self) -> &F {
        &self.feedback
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_holding(&self) -> bool {
        matches!(self.state, ControlState::Holding { .. })
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.state.session_id()
    }

    pub fn commit_status(&self) -> Option<&CommitStatus> {
        match &self.state {
            ControlState::Confirmed { commit, .. } => Some(commit),
            _ => None,
        }
    }

    pub fn view(&self) -> ControlView {
        ControlView {
            phase: self.phase,
            progress: self.progress,
            disabled: self.disabled,
            session_id: self.current_session(),
            commit: self
                .commit_status()
                .cloned()
                .unwrap_or(CommitStatus::NotStarted),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Eligibility input. While disabled, presses are rejected; a hold
    /// already in progress is unaffected.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Call-site data copied into every commit request.
    pub fn set_payload(&mut self, payload: serde_json::Value) {
        self.payload = payload;
    }

    pub fn begin(&mut self) -> Transition {
        self.handle(Input::Press)
    }

    pub fn release(&mut self, reason: ReleaseReason) -> Transition {
        self.handle(Input::Release(reason))
    }

    pub fn sample(&mut self) -> Transition {
        self.handle(Input::Sample)
    }

    pub fn resolve_commit(&mut self, outcome: CommitOutcome) -> Transition {
        self.handle(Input::CommitResolved(outcome))
    }

    pub fn sync_pending(&mut self, pending: bool) -> Transition {
        self.handle(Input::PendingSync(pending))
    }

    pub fn retry_commit(&mut self) -> Transition {
        self.handle(Input::RetryCommit)
    }

    /// The transition function. Every state change goes through here.
    pub fn handle(&mut self, input: Input) -> Transition {
        let now = self.clock.now_ms();
        let state = std::mem::replace(&mut self.state, ControlState::Idle);
        let (next, transition) = self.step(state, input, now);
        self.state = next;
        if let Some(reason) = &transition.rejected {
            trace!(?reason, "input rejected");
        }
        transition
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn step(&mut self, state: ControlState, input: Input, now: u64) -> (ControlState, Transition) {
        match (state, input) {
            // Press
            (state, Input::Press) if self.disabled => (state, Transition::rejected(Rejection::Disabled)),
            (state @ ControlState::Holding { .. }, Input::Press) => {
                (state, Transition::rejected(Rejection::SessionActive))
            }
            // A retryable failure keeps its request; only retry_commit moves it on.
            (
                state @ ControlState::Confirmed {
                    request: Some(_),
                    commit: CommitStatus::Failed { retryable: true, .. },
                    ..
                },
                Input::Press,
            ) => (state, Transition::rejected(Rejection::AlreadyConfirmed)),
            (state, Input::Press) => {
                if let ControlState::Decaying { session_id, .. } = &state {
                    debug!(session = %session_id, "decay aborted by new press");
                }
                self.begin_session(now)
            }

            // Release
            (ControlState::Holding { session }, Input::Release(reason)) => {
                self.release_session(session, reason, now)
            }
            (state @ ControlState::Confirmed { .. }, Input::Release(_)) => {
                (state, Transition::rejected(Rejection::AlreadyConfirmed))
            }
            (state, Input::Release(_)) => (state, Transition::rejected(Rejection::NotHolding)),

            // Sample
            (ControlState::Holding { session }, Input::Sample) => self.sample_holding(session, now),
            (ControlState::Decaying { session_id, decay }, Input::Sample) => {
                self.sample_decaying(session_id, decay, now)
            }
            (state, Input::Sample) => {
                self.feedback.on_sample(self.progress, self.phase);
                (state, Transition::default())
            }

            // Commit outcome
            (
                ControlState::Confirmed {
                    session_id: Some(current),
                    request,
                    commit: CommitStatus::InFlight,
                },
                Input::CommitResolved(outcome),
            ) if current == outcome.session_id => self.apply_outcome(current, request, outcome),
            (state, Input::CommitResolved(outcome)) => {
                warn!(
                    session = %outcome.session_id,
                    current = ?state.session_id(),
                    "ignoring commit outcome for a session that is no longer current"
                );
                (
                    state,
                    Transition::rejected(Rejection::StaleCommit {
                        session_id: outcome.session_id,
                    }),
                )
            }

            // External pending signal
            (ControlState::Idle | ControlState::Decaying { .. }, Input::PendingSync(true)) => {
                let mut t = Transition::default();
                self.progress = 1.0;
                self.set_phase(Phase::Confirmed, None, &mut t);
                t.events.push(Event::CommitPendingSynced {
                    pending: true,
                    at: Utc::now(),
                });
                (
                    ControlState::Confirmed {
                        session_id: None,
                        request: None,
                        commit: CommitStatus::InFlight,
                    },
                    t,
                )
            }
            (state @ ControlState::Holding { .. }, Input::PendingSync(true)) => {
                (state, Transition::rejected(Rejection::SessionActive))
            }
            (ControlState::Confirmed { session_id: None, .. }, Input::PendingSync(false)) => {
                let mut t = Transition::default();
                self.progress = 0.0;
                self.set_phase(Phase::Idle, None, &mut t);
                t.events.push(Event::CommitPendingSynced {
                    pending: false,
                    at: Utc::now(),
                });
                (ControlState::Idle, t)
            }
            (state, Input::PendingSync(_)) => (state, Transition::default()),

            // Manual retry of a failed commit
            (
                ControlState::Confirmed {
                    session_id: Some(id),
                    request: Some(request),
                    commit: CommitStatus::Failed { .. },
                },
                Input::RetryCommit,
            ) => {
                info!(session = %id, "retrying commit");
                let t = Transition {
                    events: vec![Event::CommitRetried {
                        session_id: id,
                        at: Utc::now(),
                    }],
                    commit: Some(request.clone()),
                    rejected: None,
                };
                (
                    ControlState::Confirmed {
                        session_id: Some(id),
                        request: Some(request),
                        commit: CommitStatus::InFlight,
                    },
                    t,
                )
            }
            (state, Input::RetryCommit) => (state, Transition::rejected(Rejection::NothingToRetry)),
        }
    }

    fn begin_session(&mut self, now: u64) -> (ControlState, Transition) {
        let id = SessionId(self.next_session);
        self.next_session += 1;
        let session = GestureSession::new(id, now, self.config.required_duration_ms);

        let mut t = Transition::default();
        self.progress = 0.0;
        self.set_phase(Phase::Idle, Some(id), &mut t);
        t.events.push(Event::GestureStarted {
            session_id: id,
            required_duration_ms: self.config.required_duration_ms,
            at: Utc::now(),
        });
        debug!(session = %id, required_ms = self.config.required_duration_ms, "hold started");
        (ControlState::Holding { session }, t)
    }

    fn sample_holding(&mut self, session: GestureSession, now: u64) -> (ControlState, Transition) {
        let progress = session.progress_at(now);
        if progress >= 1.0 {
            return self.confirm(session);
        }

        let mut t = Transition::default();
        self.progress = progress;
        let phase = classify(progress, &self.config.thresholds);
        self.set_phase(phase, Some(session.id()), &mut t);
        self.feedback.on_sample(progress, phase);
        (ControlState::Holding { session }, t)
    }

    fn release_session(
        &mut self,
        session: GestureSession,
        reason: ReleaseReason,
        now: u64,
    ) -> (ControlState, Transition) {
        let progress = session.progress_at(now);
        // Full duration elapsed before the loop sampled it: the hold happened.
        if progress >= 1.0 {
            return self.confirm(session);
        }

        let id = session.id();
        let mut t = Transition::default();
        self.progress = progress;
        t.events.push(Event::GestureCancelled {
            session_id: id,
            progress,
            reason,
            at: Utc::now(),
        });
        debug!(session = %id, progress, ?reason, "hold released early");

        if progress <= 0.0 {
            self.set_phase(Phase::Idle, Some(id), &mut t);
            t.events.push(Event::GestureReset {
                session_id: id,
                at: Utc::now(),
            });
            return (ControlState::Idle, t);
        }

        let decay = CancellationDecay::new(progress, now, self.config.decay_duration_ms);
        let phase = classify_cancelling(progress, &self.config.thresholds);
        self.set_phase(phase, Some(id), &mut t);
        (ControlState::Decaying { session_id: id, decay }, t)
    }

    fn sample_decaying(
        &mut self,
        session_id: SessionId,
        decay: CancellationDecay,
        now: u64,
    ) -> (ControlState, Transition) {
        let mut t = Transition::default();

        if decay.is_settled(now) {
            self.progress = 0.0;
            self.set_phase(Phase::Idle, Some(session_id), &mut t);
            self.feedback.on_sample(0.0, Phase::Idle);
            t.events.push(Event::GestureReset {
                session_id,
                at: Utc::now(),
            });
            debug!(session = %session_id, "decay settled");
            return (ControlState::Idle, t);
        }

        let progress = decay.progress_at(now);
        self.progress = progress;
        let phase = classify_cancelling(progress, &self.config.thresholds);
        self.set_phase(phase, Some(session_id), &mut t);
        self.feedback.on_sample(progress, phase);
        (ControlState::Decaying { session_id, decay }, t)
    }

    fn confirm(&mut self, mut session: GestureSession) -> (ControlState, Transition) {
        let id = session.id();
        let mut t = Transition::default();
        if !session.try_complete() {
            return (ControlState::Holding { session }, t);
        }

        self.progress = 1.0;
        self.set_phase(Phase::Confirmed, Some(id), &mut t);
        self.feedback.on_sample(1.0, Phase::Confirmed);

        let request = CommitRequest {
            session_id: id,
            idempotency_key: session.idempotency_key().to_string(),
            payload: self.payload.clone(),
        };
        t.events.push(Event::GestureConfirmed {
            session_id: id,
            idempotency_key: request.idempotency_key.clone(),
            at: Utc::now(),
        });
        t.commit = Some(request.clone());
        info!(session = %id, key = %request.idempotency_key, "hold confirmed");

        (
            ControlState::Confirmed {
                session_id: Some(id),
                request: Some(request),
                commit: CommitStatus::InFlight,
            },
            t,
        )
    }

    fn apply_outcome(
        &mut self,
        session_id: SessionId,
        request: Option<CommitRequest>,
        outcome: CommitOutcome,
    ) -> (ControlState, Transition) {
        let mut t = Transition::default();
        let commit = match outcome.result {
            Ok(state) => {
                t.events.push(Event::CommitSucceeded {
                    session_id,
                    state,
                    attempts: outcome.attempts,
                    at: Utc::now(),
                });
                CommitStatus::Succeeded { state }
            }
            Err(error) => {
                let retryable = error.is_retryable();
                warn!(session = %session_id, %error, retryable, "commit failed");
                t.events.push(Event::CommitFailed {
                    session_id,
                    error: error.clone(),
                    retryable,
                    at: Utc::now(),
                });
                CommitStatus::Failed { error, retryable }
            }
        };
        (
            ControlState::Confirmed {
                session_id: Some(session_id),
                request,
                commit,
            },
            t,
        )
    }

    fn set_phase(&mut self, phase: Phase, session_id: Option<SessionId>, t: &mut Transition) {
        if phase == self.phase {
            return;
        }
        trace!(from = %self.phase, to = %phase, progress = self.progress, "phase changed");
        t.events.push(Event::PhaseChanged {
            session_id,
            from: self.phase,
            to: phase,
            progress: self.progress,
            at: Utc::now(),
        });
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::clock::ManualClock;
    use crate::gesture::feedback::RecordedFeedback;
    use proptest::prelude::*;

    fn purchase(clock: &ManualClock) -> HoldControl<ManualClock, RecordedFeedback> {
        HoldControl::with_feedback(
            GestureConfig::purchase_confirm(),
            clock.clone(),
            RecordedFeedback::default(),
        )
    }

    fn ok_outcome(session_id: SessionId, streak: u32) -> CommitOutcome {
        CommitOutcome {
            session_id,
            idempotency_key: "hold-test".into(),
            attempts: 1,
            result: Ok(LedgerState {
                current_streak: streak,
                longest_streak: streak,
                total_completions: u64::from(streak),
                last_completion_date: None,
            }),
        }
    }

    fn has_event(t: &Transition, pred: impl Fn(&Event) -> bool) -> bool {
        t.events.iter().any(pred)
    }

    #[test]
    fn full_hold_confirms_and_requests_commit() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);

        let t = control.begin();
        assert!(has_event(&t, |e| matches!(e, Event::GestureStarted { .. })));
        assert!(control.is_holding());

        clock.advance(750);
        let t = control.sample();
        assert!(t.commit.is_none());
        assert_eq!(control.phase(), Phase::Radiating);
        assert!((control.progress() - 0.5).abs() < 1e-9);

        clock.advance(750);
        let t = control.sample();
        let request = t.commit.expect("commit request on confirmation");
        assert_eq!(request.session_id, SessionId(1));
        assert!(request.idempotency_key.starts_with("hold-"));
        assert_eq!(control.phase(), Phase::Confirmed);
        assert_eq!(control.commit_status(), Some(&CommitStatus::InFlight));
    }

    #[test]
    fn repeated_samples_past_full_progress_commit_once() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();

        clock.advance(5_000);
        let commits: usize = (0..10)
            .map(|_| {
                clock.advance(16);
                control.sample().commit.is_some() as usize
            })
            .sum();
        assert_eq!(commits, 1);
    }

    #[test]
    fn release_after_confirm_has_no_effect() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_500);
        control.sample();

        let t = control.release(ReleaseReason::PointerUp);
        assert_eq!(t.rejected, Some(Rejection::AlreadyConfirmed));
        assert_eq!(control.phase(), Phase::Confirmed);
    }

    #[test]
    fn release_after_full_duration_but_before_sample_still_confirms() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_600);
        let t = control.release(ReleaseReason::PointerUp);
        assert!(t.commit.is_some());
        assert_eq!(control.phase(), Phase::Confirmed);
    }

    #[test]
    fn early_release_decays_back_to_idle() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_200); // 0.8
        control.sample();
        assert_eq!(control.phase(), Phase::Radiating);

        let t = control.release(ReleaseReason::LeftBounds);
        assert!(has_event(&t, |e| matches!(
            e,
            Event::GestureCancelled { reason: ReleaseReason::LeftBounds, .. }
        )));
        assert!(t.commit.is_none());

        // Decay duration 400 ms per unit: 0.8 takes 320 ms.
        clock.advance(100);
        control.sample();
        assert!((control.progress() - 0.55).abs() < 1e-9);
        assert_eq!(control.phase(), Phase::Radiating);

        clock.advance(60);
        control.sample();
        assert_eq!(control.phase(), Phase::Charging);

        clock.advance(200);
        let t = control.sample();
        assert!(has_event(&t, |e| matches!(e, Event::GestureReset { .. })));
        assert_eq!(control.phase(), Phase::Idle);
        assert_eq!(control.progress(), 0.0);
        assert!(matches!(control.state(), ControlState::Idle));
    }

    #[test]
    fn decay_feedback_is_non_increasing() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_400);
        control.sample();
        let held = control.feedback().samples.len();
        control.release(ReleaseReason::CaptureLost);
        for _ in 0..30 {
            clock.advance(16);
            control.sample();
        }
        let decayed: Vec<f64> = control.feedback().samples[held..]
            .iter()
            .map(|(p, _)| *p)
            .collect();
        assert!(decayed.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(decayed.last().copied(), Some(0.0));
    }

    #[test]
    fn new_press_during_decay_starts_fresh_session() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_200);
        control.sample();
        control.release(ReleaseReason::PointerUp);
        clock.advance(50);
        control.sample();
        assert!(control.progress() > 0.5);

        let t = control.begin();
        assert!(!t.is_rejected());
        assert_eq!(control.current_session(), Some(SessionId(2)));
        assert_eq!(control.progress(), 0.0);

        clock.advance(150);
        control.sample();
        assert!((control.progress() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn second_press_while_holding_is_ignored() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(300);
        let t = control.begin();
        assert_eq!(t.rejected, Some(Rejection::SessionActive));
        assert_eq!(control.current_session(), Some(SessionId(1)));

        control.sample();
        assert!((control.progress() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn disabled_control_rejects_press() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.set_disabled(true);
        let t = control.begin();
        assert_eq!(t.rejected, Some(Rejection::Disabled));
        assert!(t.events.is_empty());
        assert!(matches!(control.state(), ControlState::Idle));

        control.set_disabled(false);
        assert!(!control.begin().is_rejected());
    }

    #[test]
    fn commit_failure_keeps_confirmation_and_allows_retry() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_500);
        let request = control.sample().commit.unwrap();

        let t = control.resolve_commit(CommitOutcome {
            session_id: request.session_id,
            idempotency_key: request.idempotency_key.clone(),
            attempts: 5,
            result: Err(CommitError::Unreachable("offline".into())),
        });
        assert!(has_event(&t, |e| matches!(e, Event::CommitFailed { retryable: true, .. })));
        assert_eq!(control.phase(), Phase::Confirmed);
        assert!(matches!(
            control.commit_status(),
            Some(CommitStatus::Failed { retryable: true, .. })
        ));

        let t = control.retry_commit();
        let retried = t.commit.unwrap();
        assert_eq!(retried, request);
        assert_eq!(control.commit_status(), Some(&CommitStatus::InFlight));

        let t = control.resolve_commit(ok_outcome(request.session_id, 3));
        assert!(has_event(&t, |e| matches!(e, Event::CommitSucceeded { .. })));
    }

    #[test]
    fn press_after_retryable_failure_keeps_the_pending_request() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_500);
        let request = control.sample().commit.unwrap();
        control.resolve_commit(CommitOutcome {
            session_id: request.session_id,
            idempotency_key: request.idempotency_key.clone(),
            attempts: 5,
            result: Err(CommitError::Timeout { after_ms: 3_000 }),
        });

        let t = control.begin();
        assert_eq!(t.rejected, Some(Rejection::AlreadyConfirmed));
        assert!(t.commit.is_none());
        assert_eq!(control.state().session_id(), Some(request.session_id));
        assert_eq!(control.phase(), Phase::Confirmed);

        // The original key is still the one that gets re-sent.
        let retried = control.retry_commit().commit.unwrap();
        assert_eq!(retried.idempotency_key, request.idempotency_key);
    }

    #[test]
    fn press_after_final_failure_starts_a_new_session() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_500);
        let request = control.sample().commit.unwrap();
        control.resolve_commit(CommitOutcome {
            session_id: request.session_id,
            idempotency_key: request.idempotency_key.clone(),
            attempts: 1,
            result: Err(CommitError::Rejected("insufficient balance".into())),
        });

        assert!(!control.begin().is_rejected());
        assert!(control.is_holding());
    }

    #[test]
    fn retry_without_failure_is_rejected() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        assert_eq!(control.retry_commit().rejected, Some(Rejection::NothingToRetry));
    }

    #[test]
    fn stale_commit_does_not_touch_newer_session() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_500);
        let a = control.sample().commit.unwrap();

        control.begin();
        clock.advance(300);
        control.sample();
        let before = control.view();

        let t = control.resolve_commit(ok_outcome(a.session_id, 9));
        assert_eq!(
            t.rejected,
            Some(Rejection::StaleCommit {
                session_id: a.session_id
            })
        );
        assert!(t.events.is_empty());
        assert_eq!(control.view(), before);
        assert!(control.is_holding());
    }

    #[test]
    fn duplicate_outcome_after_success_is_ignored() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        clock.advance(1_500);
        let request = control.sample().commit.unwrap();
        control.resolve_commit(ok_outcome(request.session_id, 1));
        let t = control.resolve_commit(ok_outcome(request.session_id, 2));
        assert!(t.is_rejected());
        assert_eq!(
            control.commit_status(),
            Some(&CommitStatus::Succeeded {
                state: ok_outcome(request.session_id, 1).result.unwrap()
            })
        );
    }

    #[test]
    fn external_pending_signal_renders_in_flight() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        let t = control.sync_pending(true);
        assert!(has_event(&t, |e| matches!(e, Event::CommitPendingSynced { pending: true, .. })));
        let view = control.view();
        assert_eq!(view.phase, Phase::Confirmed);
        assert_eq!(view.commit, CommitStatus::InFlight);
        assert_eq!(view.session_id, None);

        control.sync_pending(false);
        assert_eq!(control.view().commit, CommitStatus::NotStarted);
        assert_eq!(control.phase(), Phase::Idle);
        assert!(matches!(control.state(), ControlState::Idle));
    }

    #[test]
    fn pending_signal_does_not_interrupt_a_hold() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        assert_eq!(
            control.sync_pending(true).rejected,
            Some(Rejection::SessionActive)
        );
        assert!(control.is_holding());
    }

    #[test]
    fn phase_changes_are_reported_once_per_transition() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.begin();
        let mut changes = Vec::new();
        for _ in 0..320 {
            clock.advance(5);
            for event in control.sample().events {
                if let Event::PhaseChanged { to, .. } = event {
                    changes.push(to);
                }
            }
        }
        assert_eq!(
            changes,
            vec![
                Phase::Pressing,
                Phase::Charging,
                Phase::Radiating,
                Phase::Critical,
                Phase::Finishing,
                Phase::Confirmed,
            ]
        );
        // One feedback sample per call, phase events only on change.
        assert_eq!(control.feedback().samples.len(), 320);
    }

    #[test]
    fn payload_is_carried_into_commit_request() {
        let clock = ManualClock::new();
        let mut control = purchase(&clock);
        control.set_payload(serde_json::json!({ "item": "golden-frame" }));
        control.begin();
        clock.advance(2_000);
        let request = control.sample().commit.unwrap();
        assert_eq!(request.payload["item"], "golden-frame");
    }

    proptest! {
        #[test]
        fn commit_fires_exactly_once_per_session(
            steps in proptest::collection::vec(0u64..400, 1..80),
        ) {
            let clock = ManualClock::new();
            let mut control = HoldControl::new(GestureConfig::purchase_confirm(), clock.clone());
            control.begin();
            let mut commits = 0;
            let mut elapsed = 0;
            for step in steps {
                clock.advance(step);
                elapsed += step;
                if control.sample().commit.is_some() {
                    commits += 1;
                }
            }
            let expected = if elapsed >= 1_500 { 1 } else { 0 };
            prop_assert_eq!(commits, expected);
        }

        #[test]
        fn early_release_always_settles_at_idle(
            hold_ms in 0u64..1_500,
            steps in proptest::collection::vec(1u64..50, 20..60),
        ) {
            let clock = ManualClock::new();
            let mut control = HoldControl::new(GestureConfig::purchase_confirm(), clock.clone());
            control.begin();
            clock.advance(hold_ms);
            control.sample();
            let t = control.release(ReleaseReason::PointerUp);
            prop_assert!(t.commit.is_none());
            let mut commits = 0;
            for step in steps {
                clock.advance(step);
                if control.sample().commit.is_some() {
                    commits += 1;
                }
            }
            // Past the longest possible decay window.
            clock.advance(400);
            control.sample();
            prop_assert_eq!(commits, 0);
            prop_assert_eq!(control.progress(), 0.0);
            prop_assert_eq!(control.phase(), Phase::Idle);
            prop_assert!(matches!(control.state(), ControlState::Idle));
        }
    }
}
