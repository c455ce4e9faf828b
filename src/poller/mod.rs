//! Tracks one analysis job by polling the shared queue endpoint.
//!
//! A [`ProgressPoller`] moves through `Idle -> Active -> Stopped` exactly
//! once. While active it owns a single background task that fetches a
//! [`QueueSnapshot`] every interval (the first fetch happens immediately),
//! looks the job up and reports through a [`ProgressObserver`]. The job
//! showing up as completed or failed ends the session; transport and
//! server errors are reported but polling carries on.
//!
//! Ticks are serialized: the next fetch is issued only after the previous
//! one resolved, so a stale response can never overwrite a newer one.
//!
//! Observer callbacks run under a dispatch lock that [`ProgressPoller::stop`]
//! also takes, so once `stop()` returns no callback is running or will run.
//! The polling task only holds a weak reference to the session; dropping
//! the last handle cancels it.

mod eta;
mod observer;

use crate::api::{ApiError, QueueSource};
use crate::core::models::QueueSnapshot;
use crate::core::retry::ErrorStreak;
use crate::core::settings::PollingSettings;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub use eta::estimate_remaining;
pub use observer::{ChannelObserver, PollEvent, ProgressObserver, ProgressUpdate};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

const NETWORK_ERROR_MESSAGE: &str = "network error";
const SERVER_ERROR_FALLBACK: &str = "failed to load analysis queue";
const JOB_FAILED_FALLBACK: &str = "analysis failed";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("task id must not be empty")]
    EmptyTaskId,
    #[error("polling interval must be greater than zero")]
    ZeroInterval,
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Give up after this many failed fetches in a row. `None` keeps
    /// polling through any number of errors.
    pub max_consecutive_errors: Option<u32>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_consecutive_errors: None,
        }
    }
}

impl From<&PollingSettings> for PollerConfig {
    fn from(settings: &PollingSettings) -> Self {
        Self {
            interval: settings.interval(),
            max_consecutive_errors: settings.max_consecutive_errors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Active,
    Stopped,
}

/// What a single tick found out about the tracked job.
#[derive(Debug, Clone, PartialEq)]
enum TickOutcome {
    Progress(ProgressUpdate),
    Completed,
    Failed(String),
    FetchFailed(String),
    NotFound,
}

struct SessionState {
    phase: SessionPhase,
    task: Option<JoinHandle<()>>,
    task_id: Option<tokio::task::Id>,
}

struct Inner {
    task_id: String,
    config: PollerConfig,
    source: Arc<dyn QueueSource>,
    observer: Arc<dyn ProgressObserver>,
    state: Mutex<SessionState>,
    dispatch: Mutex<()>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_active(&self) -> bool {
        self.lock().phase == SessionPhase::Active
    }

    /// Ends the session from inside the polling task.
    fn finish(&self) {
        let mut state = self.lock();
        state.phase = SessionPhase::Stopped;
        state.task = None;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = state.task.take() {
            tracing::debug!(task_id = %self.task_id, "Poller dropped while active");
            task.abort();
        }
    }
}

/// Handle to a poll session. Clones share the same session.
#[derive(Clone)]
pub struct ProgressPoller {
    inner: Arc<Inner>,
}

impl ProgressPoller {
    pub fn new(
        task_id: impl Into<String>,
        config: PollerConfig,
        source: Arc<dyn QueueSource>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<Self, PollError> {
        let task_id = task_id.into();
        if task_id.trim().is_empty() {
            return Err(PollError::EmptyTaskId);
        }
        if config.interval.is_zero() {
            return Err(PollError::ZeroInterval);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                task_id,
                config,
                source,
                observer,
                state: Mutex::new(SessionState {
                    phase: SessionPhase::Idle,
                    task: None,
                    task_id: None,
                }),
                dispatch: Mutex::new(()),
            }),
        })
    }

    pub fn task_id(&self) -> &str {
        &self.inner.task_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    /// Starts polling. Must be called from within a tokio runtime.
    ///
    /// Only the first call on an idle session has any effect.
    pub fn start(&self) {
        let mut state = self.inner.lock();
        if state.phase != SessionPhase::Idle {
            tracing::debug!(task_id = %self.inner.task_id, phase = ?state.phase, "Ignoring start");
            return;
        }

        state.phase = SessionPhase::Active;
        let started_at = Instant::now();
        let task = tokio::spawn(run_session(Arc::downgrade(&self.inner), started_at));
        state.task_id = Some(task.id());
        state.task = Some(task);

        tracing::info!(
            task_id = %self.inner.task_id,
            interval_ms = self.inner.config.interval.as_millis() as u64,
            "Started polling"
        );
    }

    /// Cancels polling. Idempotent; an in-flight fetch is dropped without
    /// reaching the observer.
    ///
    /// When called from outside the polling task this waits for a callback
    /// that is already running to return.
    pub fn stop(&self) {
        let (task, session_task) = {
            let mut state = self.inner.lock();
            if state.phase == SessionPhase::Stopped {
                return;
            }
            state.phase = SessionPhase::Stopped;
            (state.task.take(), state.task_id)
        };

        if let Some(task) = task {
            task.abort();
        }

        // A callback calling stop() already holds the dispatch lock.
        let from_session = session_task.is_some() && tokio::task::try_id() == session_task;
        if !from_session {
            drop(self.inner.lock_dispatch());
        }
        tracing::info!(task_id = %self.inner.task_id, "Stopped polling");
    }
}

async fn run_session(session: Weak<Inner>, started_at: Instant) {
    let Some(inner) = session.upgrade() else {
        return;
    };
    let mut ticker = tokio::time::interval(inner.config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut streak = ErrorStreak::new(inner.config.max_consecutive_errors);
    drop(inner);
    let mut tick: u64 = 0;

    loop {
        ticker.tick().await;
        let Some(inner) = session.upgrade() else {
            tracing::debug!("All poller handles dropped, ending session");
            break;
        };
        if !inner.is_active() {
            break;
        }

        tick += 1;
        let result = inner.source.fetch_queue().await;
        if Arc::strong_count(&inner) == 1 {
            tracing::debug!(task_id = %inner.task_id, tick, "Poller dropped during fetch");
            break;
        }
        if !dispatch_tick(&inner, tick, result, started_at, &mut streak) {
            break;
        }
    }
}

/// Evaluates one fetch result and notifies the observer. Returns whether
/// polling should continue.
fn dispatch_tick(
    inner: &Inner,
    tick: u64,
    result: Result<QueueSnapshot, ApiError>,
    started_at: Instant,
    streak: &mut ErrorStreak,
) -> bool {
    let _dispatch = inner.lock_dispatch();
    if !inner.is_active() {
        tracing::debug!(task_id = %inner.task_id, tick, "Discarding response after stop");
        return false;
    }

    let outcome = evaluate(&inner.task_id, result, started_at.elapsed());
    tracing::debug!(task_id = %inner.task_id, tick, ?outcome, "Poll tick");

    match outcome {
        TickOutcome::Progress(update) => {
            streak.record_success();
            inner.observer.on_progress(&update);
        }
        TickOutcome::Completed => {
            inner.finish();
            tracing::info!(task_id = %inner.task_id, tick, "Analysis completed");
            inner.observer.on_complete();
            inner.observer.on_finished();
            return false;
        }
        TickOutcome::Failed(reason) => {
            inner.finish();
            tracing::warn!(task_id = %inner.task_id, tick, %reason, "Analysis failed");
            inner.observer.on_error(&reason);
            inner.observer.on_finished();
            return false;
        }
        TickOutcome::FetchFailed(message) => {
            streak.record_failure();
            if streak.is_exhausted() {
                inner.finish();
                let failures = streak.consecutive_failures();
                tracing::warn!(task_id = %inner.task_id, failures, "Giving up after repeated errors");
                inner.observer.on_error(&format!(
                    "{} (giving up after {} consecutive failures)",
                    message, failures
                ));
                inner.observer.on_finished();
                return false;
            }
            inner.observer.on_error(&message);
        }
        TickOutcome::NotFound => {
            streak.record_success();
        }
    }

    inner.is_active()
}

fn evaluate(
    task_id: &str,
    result: Result<QueueSnapshot, ApiError>,
    elapsed: Duration,
) -> TickOutcome {
    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(ApiError::Server(message)) => {
            tracing::warn!(task_id, error = ?message, "Queue endpoint reported failure");
            return TickOutcome::FetchFailed(
                message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| SERVER_ERROR_FALLBACK.to_string()),
            );
        }
        Err(e) => {
            tracing::warn!(task_id, error = %e, "Failed to fetch analysis queue");
            return TickOutcome::FetchFailed(NETWORK_ERROR_MESSAGE.to_string());
        }
    };

    if let Some(running) = snapshot.find_running(task_id) {
        return TickOutcome::Progress(ProgressUpdate {
            percent: running.progress,
            step: running.step.clone(),
            eta_seconds: estimate_remaining(elapsed, running.progress),
        });
    }

    if snapshot.is_completed(task_id) {
        return TickOutcome::Completed;
    }

    if let Some(failed) = snapshot.find_failed(task_id) {
        let reason = failed
            .error
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| JOB_FAILED_FALLBACK.to_string());
        return TickOutcome::Failed(reason);
    }

    TickOutcome::NotFound
}
