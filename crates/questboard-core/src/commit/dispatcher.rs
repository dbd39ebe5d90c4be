use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{CommitChannel, CommitOutcome, CommitRequest, RetryPolicy};
use crate::error::CommitError;
use crate::ledger::LedgerState;

/// Run `request` against `channel`, retrying retryable failures with backoff.
///
/// Each attempt runs on the blocking pool and is bounded by
/// `policy.attempt_timeout_ms`. All attempts reuse the request unchanged.
pub async fn commit_with_retry(
    channel: Arc<dyn CommitChannel>,
    request: CommitRequest,
    policy: RetryPolicy,
) -> CommitOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let result = run_attempt(&channel, &request, policy.attempt_timeout_ms).await;

        match result {
            Ok(state) => {
                debug!(
                    channel = channel.name(),
                    session = %request.session_id,
                    attempt,
                    "commit succeeded"
                );
                return outcome(&request, attempt, Ok(state));
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    channel = channel.name(),
                    session = %request.session_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "commit failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                warn!(
                    channel = channel.name(),
                    session = %request.session_id,
                    attempt,
                    error = %err,
                    "commit gave up"
                );
                return outcome(&request, attempt, Err(err));
            }
        }
    }
}

async fn run_attempt(
    channel: &Arc<dyn CommitChannel>,
    request: &CommitRequest,
    timeout_ms: u64,
) -> Result<LedgerState, CommitError> {
    let timeout_ms = timeout_ms.max(1);
    let channel = Arc::clone(channel);
    let request = request.clone();
    let task = tokio::task::spawn_blocking(move || channel.commit(&request));

    match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(CommitError::Unreachable(format!(
            "commit task aborted: {join_err}"
        ))),
        Err(_) => Err(CommitError::Timeout {
            after_ms: timeout_ms,
        }),
    }
}

fn outcome(
    request: &CommitRequest,
    attempts: u32,
    result: Result<LedgerState, CommitError>,
) -> CommitOutcome {
    CommitOutcome {
        session_id: request.session_id,
        idempotency_key: request.idempotency_key.clone(),
        attempts,
        result,
    }
}

/// Fire-and-forget commit runner.
///
/// `dispatch` returns immediately; outcomes arrive on
/// [`next_outcome`](Self::next_outcome) in completion order, which may
/// differ from dispatch order. Must be used inside a tokio runtime.
pub struct CommitDispatcher {
    channel: Arc<dyn CommitChannel>,
    policy: RetryPolicy,
    outcomes_tx: mpsc::UnboundedSender<CommitOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<CommitOutcome>,
}

impl CommitDispatcher {
    pub fn new(channel: Arc<dyn CommitChannel>, policy: RetryPolicy) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            channel,
            policy,
            outcomes_tx,
            outcomes_rx,
        }
    }

    pub fn dispatch(&self, request: CommitRequest) -> JoinHandle<()> {
        let channel = Arc::clone(&self.channel);
        let policy = self.policy;
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let outcome = commit_with_retry(channel, request, policy).await;
            // Receiver dropped means the control is gone; nothing to apply to.
            let _ = tx.send(outcome);
        })
    }

    /// Wait for the next finished commit.
    pub async fn next_outcome(&mut self) -> Option<CommitOutcome> {
        self.outcomes_rx.recv().await
    }
}
