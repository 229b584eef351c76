use crate::api::{DetectionApi, UploadFile, UploadPlan};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tooltrackcore::normalizer::shape::UNRECOGNIZED_ENTRY;
use tooltrackcore::normalizer::{OperationResult, ShapeNormalizer};
use tooltrackcore::prelude::{Threshold, TransportError};
use tooltrackcore::telemetry::{LogManager, MetricsRecorder};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RunError {
    #[error("an upload is already in progress")]
    Busy,
    #[error("recognition request for {file} failed: {source}")]
    Request {
        file: String,
        #[source]
        source: TransportError,
    },
    #[error("unrecognized response for {file}")]
    Unrecognized { file: String },
}

/// Admits one upload at a time.
#[derive(Debug, Default)]
pub struct UploadGate {
    busy: Arc<AtomicBool>,
}

/// Held for the duration of an upload; releases the gate on drop.
#[derive(Debug)]
pub struct UploadPermit {
    busy: Arc<AtomicBool>,
}

impl UploadGate {
    pub fn try_acquire(&self) -> Option<UploadPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| UploadPermit {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for UploadPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Reported after every file of a batch with the re-normalized partial operation.
pub struct BatchProgress<'a> {
    pub current: usize,
    pub total: usize,
    pub operation: &'a OperationResult,
}

/// Sends an [`UploadPlan`] to the detection service and normalizes what comes back.
pub struct UploadRunner<A: DetectionApi> {
    api: Arc<A>,
    normalizer: ShapeNormalizer,
    gate: UploadGate,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<A: DetectionApi> UploadRunner<A> {
    pub fn new(api: Arc<A>, normalizer: ShapeNormalizer, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            api,
            normalizer,
            gate: UploadGate::default(),
            metrics,
            logger: LogManager::new("runner"),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Runs the plan; statuses of the result are meant to be read under `threshold`.
    ///
    /// Batch files are sent one at a time in selection order and a failing file
    /// becomes a failed image instead of aborting the batch.
    pub async fn run<F>(
        &self,
        plan: &UploadPlan,
        threshold: Threshold,
        mut progress: F,
    ) -> Result<OperationResult, RunError>
    where
        F: FnMut(BatchProgress<'_>),
    {
        let _permit = self.gate.try_acquire().ok_or(RunError::Busy)?;
        let started = Instant::now();

        let operation = match plan {
            UploadPlan::Single(file) => {
                let raw = self.api.detect_single(file).await.map_err(|source| {
                    self.request_failed(file, source)
                })?;
                self.normalize_response(file, &raw, threshold)?
            }
            UploadPlan::Archive(file) => {
                let raw = self.api.detect_archive(file).await.map_err(|source| {
                    self.request_failed(file, source)
                })?;
                self.normalize_response(file, &raw, threshold)?
            }
            UploadPlan::Batch(files) => {
                let total = files.len();
                let mut entries: Vec<Value> = Vec::with_capacity(total);
                let mut partial = OperationResult::default().with_threshold(threshold);
                for (idx, file) in files.iter().enumerate() {
                    let entry = match self.api.detect_single(file).await {
                        Ok(result) => self.batch_entry(file, result),
                        Err(err) => {
                            self.logger
                                .warn(&format!("{} failed inside batch: {}", file.name, err));
                            json!({"filename": file.name, "error": err.to_string()})
                        }
                    };
                    entries.push(entry);
                    partial = self.normalize(&json!({ "results": entries }), threshold);
                    progress(BatchProgress {
                        current: idx + 1,
                        total,
                        operation: &partial,
                    });
                }
                partial
            }
        };

        Ok(self.finish(operation, started))
    }

    fn normalize(&self, raw: &Value, threshold: Threshold) -> OperationResult {
        self.normalizer.normalize(raw).operation.with_threshold(threshold)
    }

    /// A whole response the normalizer cannot read is the caller's problem, not an empty result.
    fn normalize_response(
        &self,
        file: &UploadFile,
        raw: &Value,
        threshold: Threshold,
    ) -> Result<OperationResult, RunError> {
        let normalized = self.normalizer.normalize(raw);
        if normalized.is_unrecognized() {
            self.metrics.record_unrecognized();
            self.logger
                .warn(&format!("unrecognized response for {}", file.name));
            return Err(RunError::Unrecognized {
                file: file.name.clone(),
            });
        }
        Ok(normalized.operation.with_threshold(threshold))
    }

    /// Per-file entry in the `{"results": [...]}` layout the normalizer reads as a batch.
    fn batch_entry(&self, file: &UploadFile, result: Value) -> Value {
        if self.normalizer.normalize(&result).is_unrecognized() {
            self.metrics.record_unrecognized();
            self.logger
                .warn(&format!("unrecognized response for {} inside batch", file.name));
            return json!({"filename": file.name, "error": UNRECOGNIZED_ENTRY});
        }
        match result {
            Value::Object(mut wrapper) if wrapper.contains_key("result") => {
                wrapper
                    .entry("filename")
                    .or_insert_with(|| Value::String(file.name.clone()));
                Value::Object(wrapper)
            }
            other => json!({"filename": file.name, "result": other}),
        }
    }

    fn request_failed(&self, file: &UploadFile, source: TransportError) -> RunError {
        self.logger
            .warn(&format!("recognition of {} failed: {}", file.name, source));
        RunError::Request {
            file: file.name.clone(),
            source,
        }
    }

    /// Counts images and fills the elapsed time when the server reported none.
    fn finish(&self, mut operation: OperationResult, started: Instant) -> OperationResult {
        for image in &operation.images {
            if image.is_failed() {
                self.metrics.record_failed();
            } else {
                self.metrics.record_processed();
            }
        }
        if operation.summary.total_detection_time_ms.is_none() && !operation.images.is_empty() {
            operation.summary.total_detection_time_ms = Some(started.elapsed().as_secs_f64() * 1000.0);
        }
        self.logger.record(&format!(
            "operation finished: {} images, {} failed",
            operation.images.len(),
            operation.failed_images()
        ));
        operation
    }
}
