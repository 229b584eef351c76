use crate::prelude::{SettingsService, Threshold, ThresholdCommitError, ThresholdError};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Quiet period before a slider change is pushed to the settings service.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// What the dashboard renders: the slider value and what the server acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdSnapshot {
    pub committed: Threshold,
    pub pending: Threshold,
    pub last_error: Option<String>,
}

impl ThresholdSnapshot {
    /// Value classification must use right now.
    pub fn displayed(&self) -> Threshold {
        self.pending
    }

    pub fn in_sync(&self) -> bool {
        self.committed == self.pending && self.last_error.is_none()
    }
}

/// Result of a commit that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Acknowledged,
    /// A newer commit started while this one was in flight; its answer was dropped.
    Superseded,
}

struct ThresholdState {
    committed: Threshold,
    pending: Threshold,
    last_error: Option<ThresholdCommitError>,
    /// Bumped whenever a commit starts; only the newest ticket may land.
    commit_ticket: u64,
    /// Debounce timer of the latest edit.
    timer: Option<JoinHandle<()>>,
}

impl ThresholdState {
    fn snapshot(&self) -> ThresholdSnapshot {
        ThresholdSnapshot {
            committed: self.committed,
            pending: self.pending,
            last_error: self.last_error.as_ref().map(ToString::to_string),
        }
    }
}

struct Inner<S> {
    service: S,
    debounce: Duration,
    state: Mutex<ThresholdState>,
    updates: watch::Sender<ThresholdSnapshot>,
    logger: LogManager,
    metrics: MetricsRecorder,
}

/// Owns the process-wide recognition threshold.
///
/// `set_pending` is synchronous and UI-visible; the network push happens after
/// `debounce` with no further edits. Must be used from inside a tokio runtime.
pub struct ThresholdController<S: SettingsService> {
    inner: Arc<Inner<S>>,
}

impl<S: SettingsService> Clone for ThresholdController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SettingsService> ThresholdController<S> {
    pub fn new(service: S, initial: Threshold, debounce: Duration) -> Self {
        let state = ThresholdState {
            committed: initial,
            pending: initial,
            last_error: None,
            commit_ticket: 0,
            timer: None,
        };
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                service,
                debounce,
                state: Mutex::new(state),
                updates,
                logger: LogManager::new("threshold"),
                metrics: MetricsRecorder::new(),
            }),
        }
    }

    /// Starts from the value the settings service reports, or `fallback` if it cannot be read.
    pub async fn bootstrap(service: S, fallback: Threshold, debounce: Duration) -> Self {
        let initial = match service.fetch_threshold().await {
            Ok(value) => value,
            Err(err) => {
                LogManager::new("threshold").warn(&format!(
                    "settings unavailable, starting at {}: {}",
                    fallback, err
                ));
                fallback
            }
        };
        Self::new(service, initial, debounce)
    }

    /// Last value the settings service acknowledged.
    pub fn get(&self) -> Threshold {
        self.inner.state().committed
    }

    pub fn pending(&self) -> Threshold {
        self.inner.state().pending
    }

    pub fn snapshot(&self) -> ThresholdSnapshot {
        self.inner.state().snapshot()
    }

    pub fn last_error(&self) -> Option<ThresholdCommitError> {
        self.inner.state().last_error.clone()
    }

    /// Receives a snapshot on every change so views can re-classify cached results.
    pub fn subscribe(&self) -> watch::Receiver<ThresholdSnapshot> {
        self.inner.updates.subscribe()
    }

    pub fn commit_failures(&self) -> usize {
        self.inner.metrics.snapshot().commit_failures
    }

    /// Updates the slider value and restarts the debounce timer.
    ///
    /// An already in-flight commit is left alone; only the pending timer is cancelled.
    pub fn set_pending(&self, value: f64) -> Result<Threshold, ThresholdError> {
        let value = Threshold::new(value)?;
        let mut state = self.inner.state();
        state.pending = value;
        self.inner.publish(&state);

        // Swapped under the state lock so the surviving timer belongs to the latest edit.
        let inner = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            let committing = Arc::clone(&inner);
            tokio::spawn(async move {
                let latest = committing.state().pending;
                // Failures are recorded on the controller state.
                let _ = committing.commit(latest).await;
            });
        });
        if let Some(previous) = state.timer.replace(timer) {
            previous.abort();
        }
        Ok(value)
    }

    /// Pushes `value` to the settings service immediately.
    pub async fn commit(&self, value: Threshold) -> Result<CommitOutcome, ThresholdCommitError> {
        self.inner.commit(value).await
    }
}

impl<S: SettingsService> Inner<S> {
    fn state(&self) -> MutexGuard<'_, ThresholdState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ThresholdState) {
        self.updates.send_replace(state.snapshot());
    }

    async fn commit(&self, value: Threshold) -> Result<CommitOutcome, ThresholdCommitError> {
        let ticket = {
            let mut state = self.state();
            state.commit_ticket += 1;
            state.commit_ticket
        };

        let response = self.service.push_threshold(value).await;

        let mut state = self.state();
        if state.commit_ticket != ticket {
            self.logger
                .detail(&format!("dropping stale settings response for {}", value));
            return Ok(CommitOutcome::Superseded);
        }

        match response {
            Ok(()) => {
                state.committed = value;
                state.last_error = None;
                self.publish(&state);
                self.logger.record(&format!("threshold committed at {}", value));
                Ok(CommitOutcome::Acknowledged)
            }
            Err(source) => {
                let err = ThresholdCommitError {
                    requested: value,
                    acknowledged: state.committed,
                    source,
                };
                state.last_error = Some(err.clone());
                self.publish(&state);
                self.metrics.record_commit_failure();
                self.logger.warn(&err.to_string());
                Err(err)
            }
        }
    }
}
