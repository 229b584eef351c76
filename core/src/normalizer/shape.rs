use crate::math::stats::StatsHelper;
use crate::normalizer::classifier::ClassClassifier;
use crate::normalizer::locator::{ApiBase, LOCATOR_KEYS};
use crate::normalizer::operation::{
    ImageResult, NormalizedPayload, OperationResult, OperationSummary, PayloadShape,
};
use crate::prelude::Threshold;
use crate::telemetry::log::LogManager;
use crate::wire::observation::DetectionObservation;
use crate::wire::value::{first_number, first_scalar_text, first_str, unit_fraction};
use serde_json::{Map, Value};

const DETECTION_KEYS: [&str; 4] = ["detections", "results", "predictions", "prediction"];
const SOURCE_KEYS: [&str; 4] = ["filename", "original_name", "fileName", "file_name"];
const BATCH_MARKERS: [&str; 4] = ["result", "error", "filename", "original_name"];
const THRESHOLD_KEYS: [&str; 3] = ["threshold", "recognition", "confidence_threshold"];
const OPERATION_ID_KEYS: [&str; 2] = ["operationId", "id"];
const DETECTION_TIME_KEYS: [&str; 2] = ["detectionTime", "detection_time"];
const IMAGE_CONFIDENCE_KEYS: [&str; 2] = ["imageConfidence", "image_confidence"];

/// Error recorded for a per-image entry whose result has no recognizable content.
pub const UNRECOGNIZED_ENTRY: &str = "unrecognized payload";

type Object = Map<String, Value>;

/// Turns any tolerated server payload into a canonical [`OperationResult`].
///
/// Normalization is pure and total: malformed data never panics or errors, it
/// yields failed images or an [`PayloadShape::Unrecognized`] payload.
#[derive(Debug, Clone)]
pub struct ShapeNormalizer {
    base: ApiBase,
    logger: LogManager,
}

impl ShapeNormalizer {
    pub fn new(base: ApiBase) -> Self {
        Self {
            base,
            logger: LogManager::new("normalizer"),
        }
    }

    pub fn base(&self) -> &ApiBase {
        &self.base
    }

    pub fn normalize(&self, raw: &Value) -> NormalizedPayload {
        let (shape, entries, meta) = split_payload(raw);
        if shape == PayloadShape::Unrecognized {
            self.logger
                .warn(&format!("unrecognized payload: {}", describe(raw)));
        }

        let images: Vec<ImageResult> = entries
            .into_iter()
            .map(|entry| self.image_from_entry(entry))
            .collect();
        let summary = summarize(&images, meta);
        let operation = OperationResult {
            operation_id: meta.and_then(|object| first_scalar_text(object, &OPERATION_ID_KEYS)),
            timestamp: meta.and_then(|object| first_str(object, &["timestamp"]).map(str::to_string)),
            threshold: meta
                .and_then(|object| first_number(object, &THRESHOLD_KEYS))
                .and_then(|value| Threshold::from_fraction_or_percent(value).ok()),
            images,
            summary,
        };

        self.logger.detail(&format!(
            "normalized {:?} payload into {} images ({} failed)",
            shape,
            operation.images.len(),
            operation.failed_images()
        ));

        NormalizedPayload { shape, operation }
    }

    fn image_from_entry(&self, entry: &Value) -> ImageResult {
        let Some(outer) = entry.as_object() else {
            return ImageResult::failed(None, None, "unrecognized entry");
        };
        let inner = outer.get("result");
        let inner_object = inner.and_then(Value::as_object);
        let scopes: Vec<&Object> = inner_object.into_iter().chain(Some(outer)).collect();

        let source_name = scopes
            .iter()
            .rev()
            .find_map(|scope| first_str(scope, &SOURCE_KEYS))
            .map(str::to_string);
        let image_locator = self.base.find_locator(&scopes);

        if let Some(error) = outer.get("error").filter(|value| is_error_marker(value)) {
            let message = match error {
                Value::String(text) if !text.trim().is_empty() => text.clone(),
                Value::String(_) | Value::Bool(true) => "unknown error".to_string(),
                other => other.to_string(),
            };
            return ImageResult::failed(source_name, image_locator, message);
        }

        let recognized_result = match inner {
            None | Some(Value::Array(_)) => true,
            Some(Value::Object(object)) => carries_result(object),
            Some(_) => false,
        };
        if !recognized_result {
            return ImageResult::failed(source_name, image_locator, UNRECOGNIZED_ENTRY);
        }

        let observations = match inner {
            Some(list @ Value::Array(_)) => DetectionObservation::list_from_value(list),
            _ => scopes
                .iter()
                .find_map(|scope| detection_list(scope))
                .map(DetectionObservation::list_from_value)
                .unwrap_or_default(),
        };
        let reduced = ClassClassifier::reduce(&observations);

        ImageResult {
            source_name,
            image_locator,
            findings: reduced.known,
            unknown_findings: reduced.unknown,
            error: None,
            detection_time_ms: scopes
                .iter()
                .find_map(|scope| first_number(scope, &DETECTION_TIME_KEYS))
                .filter(|ms| ms.is_finite() && *ms >= 0.0),
            image_confidence: scopes
                .iter()
                .find_map(|scope| first_number(scope, &IMAGE_CONFIDENCE_KEYS))
                .map(unit_fraction),
        }
    }
}

/// Locates the per-image entries and the object holding operation metadata.
fn split_payload(raw: &Value) -> (PayloadShape, Vec<&Value>, Option<&Object>) {
    match raw {
        Value::Array(items) => (PayloadShape::List, items.iter().collect(), None),
        Value::Object(object) => split_object(raw, object),
        _ => (PayloadShape::Unrecognized, Vec::new(), None),
    }
}

fn split_object<'a>(
    raw: &'a Value,
    object: &'a Object,
) -> (PayloadShape, Vec<&'a Value>, Option<&'a Object>) {
    if let Some(inner) = object.get("operation") {
        if let Some(inner_object) = inner.as_object() {
            return split_object(inner, inner_object);
        }
    }
    if let Some(images) = object.get("images").and_then(Value::as_array) {
        return (PayloadShape::Operation, images.iter().collect(), Some(object));
    }
    if let Some(results) = object.get("results").and_then(Value::as_array) {
        if is_batch_list(results) {
            return (PayloadShape::BatchWrapper, results.iter().collect(), Some(object));
        }
    }
    match object.get("result") {
        Some(Value::Array(items)) => {
            return (PayloadShape::ResultWrapper, items.iter().collect(), Some(object));
        }
        Some(Value::Object(inner)) if carries_result(inner) => {
            return (PayloadShape::ResultWrapper, vec![raw], Some(object));
        }
        _ => {}
    }
    if carries_result(object) {
        (PayloadShape::Single, vec![raw], Some(object))
    } else {
        (PayloadShape::Unrecognized, Vec::new(), None)
    }
}

/// A `results` list is a batch when it is empty or carries per-file entries.
fn is_batch_list(results: &[Value]) -> bool {
    results.is_empty()
        || results.iter().any(|item| {
            item.as_object()
                .is_some_and(|entry| BATCH_MARKERS.iter().any(|key| entry.contains_key(*key)))
        })
}

/// Whether an object holds detections or an image locator.
fn carries_result(object: &Object) -> bool {
    DETECTION_KEYS
        .iter()
        .chain(LOCATOR_KEYS.iter())
        .any(|key| object.contains_key(*key))
}

fn detection_list(scope: &Object) -> Option<&Value> {
    DETECTION_KEYS
        .iter()
        .find_map(|key| scope.get(*key).filter(|value| !value.is_null()))
}

fn is_error_marker(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

fn summarize(images: &[ImageResult], meta: Option<&Object>) -> OperationSummary {
    let reported = meta
        .and_then(|object| object.get("summary"))
        .and_then(Value::as_object);

    let total_detection_time_ms = reported
        .and_then(|summary| first_number(summary, &["totalDetectionTime", "total_detection_time"]))
        .or_else(|| StatsHelper::sum_known(images.iter().map(|image| image.detection_time_ms)));

    let average_match = reported
        .and_then(|summary| first_number(summary, &["averageMatch", "average_match"]))
        .map(unit_fraction)
        .or_else(|| {
            let succeeded: Vec<&ImageResult> =
                images.iter().filter(|image| !image.is_failed()).collect();
            let reported: Vec<f64> = succeeded
                .iter()
                .filter_map(|image| image.image_confidence)
                .collect();
            if reported.is_empty() {
                let slot_matches: Vec<f64> =
                    succeeded.iter().map(|image| image.slot_match()).collect();
                StatsHelper::mean(&slot_matches)
            } else {
                StatsHelper::mean(&reported)
            }
        });

    OperationSummary {
        total_images: images.len(),
        total_detection_time_ms,
        average_match,
    }
}

fn describe(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object without known keys",
    }
}
