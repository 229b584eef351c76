use serde::Serialize;
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

/// Point-in-time copy of the recorder's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub images_processed: usize,
    pub images_failed: usize,
    pub unrecognized_payloads: usize,
    pub commit_failures: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_processed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.images_processed += 1;
        }
    }

    pub fn record_failed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.images_failed += 1;
        }
    }

    pub fn record_unrecognized(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.unrecognized_payloads += 1;
        }
    }

    pub fn record_commit_failure(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.commit_failures += 1;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            Metrics::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
