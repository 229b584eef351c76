use crate::normalizer::classifier::ClassClassifier;
use crate::normalizer::operation::{ImageResult, OperationResult};
use crate::prelude::Threshold;
use serde_json::{json, Value};

/// Serializes an operation with statuses computed under its own threshold.
///
/// The output is itself a payload the [`ShapeNormalizer`](super::ShapeNormalizer)
/// accepts, and normalizing it reproduces the same [`OperationResult`].
pub fn export_operation(operation: &OperationResult) -> Value {
    let threshold = operation.effective_threshold();
    let images: Vec<Value> = operation
        .images
        .iter()
        .enumerate()
        .map(|(idx, image)| export_image(idx, image, threshold))
        .collect();

    json!({
        "operationId": operation.operation_id,
        "timestamp": operation.timestamp,
        "threshold": operation.threshold.map(Threshold::value),
        "status": operation
            .summary
            .average_match
            .map(|average| ClassClassifier::operation_status(average, threshold)),
        "summary": {
            "totalImages": operation.images.len(),
            "totalDetectionTime": operation.summary.total_detection_time_ms,
            "averageMatch": operation.summary.average_match,
        },
        "images": images,
    })
}

fn export_image(idx: usize, image: &ImageResult, threshold: Threshold) -> Value {
    let results: Vec<Value> = ClassClassifier::classify_image(image, threshold)
        .into_iter()
        .enumerate()
        .map(|(slot, classified)| {
            json!({
                "id": slot + 1,
                "name": classified.finding.tool_id,
                "displayName": classified.finding.label,
                "confidence": classified.finding.max_confidence,
                "color": classified.finding.color,
                "status": classified.status,
            })
        })
        .collect();

    json!({
        "imageNumber": idx + 1,
        "filename": image.source_name,
        "image_url": image.image_locator,
        "error": image.error,
        "detectionTime": image.detection_time_ms,
        "imageConfidence": image.image_confidence,
        "verdict": ClassClassifier::verdict(image, threshold),
        "legend": ClassClassifier::legend(image),
        "results": results,
    })
}
