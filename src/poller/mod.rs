//! Polling of analysis records until they leave `processing`.
//!
//! Each [`PollHandle`] owns one spawned tokio task. Fetches are strictly
//! sequential: the next fetch is only scheduled after the previous one
//! resolved, so at most one request is in flight per handle. State is
//! published through a `watch` channel; once [`PollHandle::cancel`] returns
//! (or the handle is dropped) the task publishes nothing further, even if a
//! fetch that was already in flight completes.

mod policy;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use policy::{PollPolicy, DEFAULT_MAX_INTERVAL, DEFAULT_POLL_INTERVAL};

use crate::api::{AnalysisRecord, AnalysisStatus, ClaimsBackend};
use crate::error::{AutoGuardError, Result};

/// Latest known state of a polled analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    /// First fetch not resolved yet
    Loading,
    /// Analysis still processing; another fetch is scheduled
    Polling(AnalysisRecord),
    Completed(AnalysisRecord),
    /// The backend reported the analysis as failed
    Failed(AnalysisRecord),
    /// A fetch errored or the attempt budget ran out
    Error(AutoGuardError),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Completed(_) | PollState::Failed(_) | PollState::Error(_)
        )
    }

    pub fn record(&self) -> Option<&AnalysisRecord> {
        match self {
            PollState::Polling(r) | PollState::Completed(r) | PollState::Failed(r) => Some(r),
            PollState::Loading | PollState::Error(_) => None,
        }
    }
}

/// Starts pollers against a backend with a shared policy.
#[derive(Clone)]
pub struct AnalysisPoller {
    backend: Arc<dyn ClaimsBackend>,
    policy: PollPolicy,
}

impl AnalysisPoller {
    pub fn new(backend: Arc<dyn ClaimsBackend>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Spawn a polling task for `analysis_id`. The first fetch is immediate.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, analysis_id: &str) -> PollHandle {
        let (state_tx, state_rx) = watch::channel(PollState::Loading);
        let publisher = Publisher {
            tx: state_tx,
            cancelled: Arc::new(Mutex::new(false)),
        };
        let cancelled = publisher.cancelled.clone();
        let wake = Arc::new(Notify::new());
        let attempts = Arc::new(AtomicU32::new(0));

        info!("Starting poll for analysis {}", analysis_id);
        let task = tokio::spawn(run_poll(
            self.backend.clone(),
            analysis_id.to_string(),
            self.policy.clone(),
            publisher,
            wake.clone(),
            attempts.clone(),
        ));

        PollHandle {
            analysis_id: analysis_id.to_string(),
            state_rx,
            cancelled,
            wake,
            attempts,
            task,
        }
    }
}

/// Publishes poll states unless the handle was cancelled.
///
/// The cancel flag and the send share one lock, so after `cancel` returns
/// no publish can slip through.
struct Publisher {
    tx: watch::Sender<PollState>,
    cancelled: Arc<Mutex<bool>>,
}

impl Publisher {
    fn publish(&self, state: PollState) -> bool {
        let cancelled = self.cancelled.lock().unwrap_or_else(|e| e.into_inner());
        if *cancelled {
            return false;
        }
        self.tx.send_replace(state);
        true
    }
}

async fn run_poll(
    backend: Arc<dyn ClaimsBackend>,
    analysis_id: String,
    policy: PollPolicy,
    publisher: Publisher,
    wake: Arc<Notify>,
    attempts: Arc<AtomicU32>,
) {
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        attempts.store(attempt, Ordering::SeqCst);
        debug!("Poll #{} for analysis {}", attempt, analysis_id);

        let result = tokio::select! {
            biased;
            _ = wake.notified() => {
                debug!("Poll for analysis {} cancelled during fetch", analysis_id);
                return;
            }
            result = backend.fetch_analysis(&analysis_id) => result,
        };

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Poll for analysis {} failed: {}", analysis_id, e);
                publisher.publish(PollState::Error(e));
                return;
            }
        };

        match record.status {
            AnalysisStatus::Processing => {
                if policy.attempts_exhausted(attempt) {
                    warn!(
                        "Analysis {} still processing after {} polls, giving up",
                        analysis_id, attempt
                    );
                    publisher.publish(PollState::Error(AutoGuardError::PollTimeout {
                        analysis_id: analysis_id.clone(),
                        attempts: attempt,
                    }));
                    return;
                }

                if !publisher.publish(PollState::Polling(record)) {
                    return;
                }

                let delay = policy.delay_for(attempt);
                debug!("Analysis {} processing, next poll in {:?}", analysis_id, delay);
                tokio::select! {
                    biased;
                    _ = wake.notified() => {
                        debug!("Poll for analysis {} cancelled while waiting", analysis_id);
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            AnalysisStatus::Completed => {
                info!("Analysis {} completed after {} polls", analysis_id, attempt);
                publisher.publish(PollState::Completed(record));
                return;
            }
            AnalysisStatus::Failed => {
                warn!("Analysis {} failed on the backend", analysis_id);
                publisher.publish(PollState::Failed(record));
                return;
            }
        }
    }
}

/// Handle to a running poll. Dropping it cancels the poll.
pub struct PollHandle {
    analysis_id: String,
    state_rx: watch::Receiver<PollState>,
    cancelled: Arc<Mutex<bool>>,
    wake: Arc<Notify>,
    attempts: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn analysis_id(&self) -> &str {
        &self.analysis_id
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PollState {
        (*self.state_rx.borrow()).clone()
    }

    /// A receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state_rx.clone()
    }

    /// True while a processing analysis is being re-fetched.
    pub fn is_polling(&self) -> bool {
        matches!(*self.state_rx.borrow(), PollState::Polling(_)) && !self.is_cancelled()
    }

    /// Number of fetches issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for a terminal state (completed, failed or error).
    ///
    /// Returns `Cancelled` if the poll was cancelled before reaching one.
    pub async fn wait_terminal(&self) -> Result<PollState> {
        let mut rx = self.state_rx.clone();
        let terminal = match rx.wait_for(PollState::is_terminal).await {
            Ok(state) => Ok((*state).clone()),
            Err(_) => Err(AutoGuardError::Cancelled),
        };
        terminal
    }

    /// Stop polling. Pending timers and in-flight fetches are abandoned and
    /// no state is published afterwards.
    pub fn cancel(&self) {
        {
            let mut cancelled = self.cancelled.lock().unwrap_or_else(|e| e.into_inner());
            if *cancelled {
                return;
            }
            *cancelled = true;
        }
        self.wake.notify_one();
        info!("Cancelled poll for analysis {}", self.analysis_id);
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            self.cancel();
        }
        self.task.abort();
    }
}
