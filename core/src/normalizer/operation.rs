use crate::prelude::Threshold;
use crate::registry::{ToolIdentity, TOOL_REGISTRY, UNKNOWN_TOOL_COLOR};
use serde::{Deserialize, Serialize};

/// Max-confidence state of one tool within one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFinding {
    pub tool_id: String,
    pub label: String,
    pub color: String,
    pub max_confidence: f64,
}

impl ToolFinding {
    pub fn absent(tool: &ToolIdentity) -> Self {
        Self {
            tool_id: tool.key.to_string(),
            label: tool.label.to_string(),
            color: tool.color.to_string(),
            max_confidence: 0.0,
        }
    }

    /// Unknown labels keep their raw text as both id and label.
    pub fn unknown(raw_label: &str, confidence: f64) -> Self {
        Self {
            tool_id: raw_label.to_string(),
            label: raw_label.to_string(),
            color: UNKNOWN_TOOL_COLOR.to_string(),
            max_confidence: confidence,
        }
    }

    pub fn is_present(&self) -> bool {
        self.max_confidence > 0.0
    }

    pub(crate) fn absorb(&mut self, confidence: f64) {
        self.max_confidence = self.max_confidence.max(confidence);
    }
}

/// One processed image; `findings` always holds one slot per registry tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResult {
    pub source_name: Option<String>,
    pub image_locator: Option<String>,
    pub findings: Vec<ToolFinding>,
    pub unknown_findings: Vec<ToolFinding>,
    pub error: Option<String>,
    pub detection_time_ms: Option<f64>,
    pub image_confidence: Option<f64>,
}

impl ImageResult {
    pub fn empty_slots() -> Vec<ToolFinding> {
        TOOL_REGISTRY.iter().map(ToolFinding::absent).collect()
    }

    /// Per-file failure; findings stay empty so the batch can still render.
    pub fn failed(
        source_name: Option<String>,
        image_locator: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_name,
            image_locator,
            findings: Self::empty_slots(),
            unknown_findings: Vec::new(),
            error: Some(message.into()),
            detection_time_ms: None,
            image_confidence: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Registry slots followed by unknown labels in discovery order.
    pub fn all_findings(&self) -> impl Iterator<Item = &ToolFinding> {
        self.findings.iter().chain(self.unknown_findings.iter())
    }

    /// Mean slot confidence, used when the server reports no image confidence.
    pub fn slot_match(&self) -> f64 {
        if self.findings.is_empty() {
            return 0.0;
        }
        self.findings
            .iter()
            .map(|finding| finding.max_confidence)
            .sum::<f64>()
            / self.findings.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationSummary {
    pub total_images: usize,
    pub total_detection_time_ms: Option<f64>,
    pub average_match: Option<f64>,
}

/// One recognition request and its per-image results, in request order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation_id: Option<String>,
    pub timestamp: Option<String>,
    pub images: Vec<ImageResult>,
    /// Threshold in force when these findings were last classified.
    pub threshold: Option<Threshold>,
    pub summary: OperationSummary,
}

impl OperationResult {
    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn effective_threshold(&self) -> Threshold {
        self.threshold.unwrap_or_default()
    }

    pub fn failed_images(&self) -> usize {
        self.images.iter().filter(|image| image.is_failed()).count()
    }
}

/// Which payload structure the normalizer recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    Single,
    List,
    BatchWrapper,
    ResultWrapper,
    Operation,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedPayload {
    pub shape: PayloadShape,
    pub operation: OperationResult,
}

impl NormalizedPayload {
    /// The payload matched no known structure; the UI shows a distinct message.
    pub fn is_unrecognized(&self) -> bool {
        self.shape == PayloadShape::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::REGISTRY_SIZE;

    #[test]
    fn failed_image_keeps_all_slots() {
        let image = ImageResult::failed(Some("a.jpg".into()), None, "timeout");
        assert!(image.is_failed());
        assert_eq!(image.findings.len(), REGISTRY_SIZE);
        assert!(image.findings.iter().all(|finding| !finding.is_present()));
    }

    #[test]
    fn absorb_keeps_maximum() {
        let mut finding = ToolFinding::unknown("Hammer", 0.3);
        finding.absorb(0.7);
        finding.absorb(0.5);
        assert_eq!(finding.max_confidence, 0.7);
        assert_eq!(finding.color, UNKNOWN_TOOL_COLOR);
    }

    #[test]
    fn effective_threshold_falls_back_to_default() {
        let operation = OperationResult::default();
        assert_eq!(operation.effective_threshold(), Threshold::DEFAULT);
        let stamped = operation.with_threshold(Threshold::new(0.9).unwrap());
        assert_eq!(stamped.effective_threshold().value(), 0.9);
    }
}
