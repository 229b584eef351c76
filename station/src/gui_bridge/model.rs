use serde::Serialize;
use tooltrackcore::normalizer::{
    ClassClassifier, ImageResult, ImageVerdict, LegendEntry, OperationResult, OperationStatus,
    ToolStatus,
};
use tooltrackcore::prelude::Threshold;
use tooltrackcore::threshold::ThresholdSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardTool {
    pub tool_id: String,
    pub label: String,
    pub color: String,
    pub confidence: f64,
    pub status: ToolStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardImage {
    pub image_number: usize,
    pub source_name: Option<String>,
    pub image_locator: Option<String>,
    pub error: Option<String>,
    pub verdict: ImageVerdict,
    pub detected: usize,
    pub tools: Vec<DashboardTool>,
    pub legend: Vec<LegendEntry>,
}

/// Current operation as the dashboard renders it under one threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardModel {
    pub threshold: ThresholdSnapshot,
    pub operation_id: Option<String>,
    pub status: Option<OperationStatus>,
    pub total_detection_time_ms: Option<f64>,
    pub average_match: Option<f64>,
    pub images: Vec<DashboardImage>,
}

impl DashboardModel {
    /// Classifies cached findings under the snapshot's displayed threshold.
    pub fn build(operation: &OperationResult, snapshot: ThresholdSnapshot) -> Self {
        let threshold = snapshot.displayed();
        Self {
            operation_id: operation.operation_id.clone(),
            status: operation
                .summary
                .average_match
                .map(|average| ClassClassifier::operation_status(average, threshold)),
            total_detection_time_ms: operation.summary.total_detection_time_ms,
            average_match: operation.summary.average_match,
            images: operation
                .images
                .iter()
                .enumerate()
                .map(|(idx, image)| dashboard_image(idx, image, threshold))
                .collect(),
            threshold: snapshot,
        }
    }
}

fn dashboard_image(idx: usize, image: &ImageResult, threshold: Threshold) -> DashboardImage {
    DashboardImage {
        image_number: idx + 1,
        source_name: image.source_name.clone(),
        image_locator: image.image_locator.clone(),
        error: image.error.clone(),
        verdict: ClassClassifier::verdict(image, threshold),
        detected: ClassClassifier::detected_count(image, threshold),
        tools: ClassClassifier::classify_image(image, threshold)
            .into_iter()
            .map(|classified| DashboardTool {
                tool_id: classified.finding.tool_id.clone(),
                label: classified.finding.label.clone(),
                color: classified.finding.color.clone(),
                confidence: classified.finding.max_confidence,
                status: classified.status,
            })
            .collect(),
        legend: ClassClassifier::legend(image),
    }
}
