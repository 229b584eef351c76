use crate::normalizer::operation::{ImageResult, ToolFinding};
use crate::prelude::Threshold;
use crate::registry::{self, REGISTRY_SIZE};
use crate::wire::observation::DetectionObservation;
use serde::{Deserialize, Serialize};

/// Tolerance for comparing confidences that went through percent arithmetic.
const EPSILON: f64 = 1e-9;

/// Tools detected in an image before it needs a manual review.
const REVIEW_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Detected,
    Uncertain,
    Missing,
}

impl ToolStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolStatus::Detected => "detected",
            ToolStatus::Uncertain => "uncertain",
            ToolStatus::Missing => "missing",
        }
    }
}

/// Overall verdict for one image, driven by how many registry tools were detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageVerdict {
    AllFound,
    NeedsReview,
    ManualRecount,
    Failed,
}

/// Status of a whole operation, from its overall match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Warning,
    Error,
}

/// Result of collapsing observations to one finding per tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedFindings {
    /// Registry order, exactly [`REGISTRY_SIZE`] entries.
    pub known: Vec<ToolFinding>,
    /// Labels outside the registry, in discovery order.
    pub unknown: Vec<ToolFinding>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedFinding<'a> {
    pub finding: &'a ToolFinding,
    pub status: ToolStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub tool_id: String,
    pub label: String,
    pub color: String,
}

/// Single source of truth for detected/uncertain/missing.
///
/// Status is never stored on a [`ToolFinding`]; it is derived on demand so a
/// threshold change only needs a re-classification of cached findings.
pub struct ClassClassifier;

impl ClassClassifier {
    /// Collapses observations per tool by maximum confidence (never sum, never last-wins).
    pub fn reduce(observations: &[DetectionObservation]) -> ReducedFindings {
        let mut known = ImageResult::empty_slots();
        let mut unknown: Vec<ToolFinding> = Vec::new();

        for observation in observations {
            let label = observation.label.trim();
            if label.is_empty() {
                continue;
            }
            if let Some(slot) = registry::resolve(label) {
                known[slot].absorb(observation.confidence);
            } else if let Some(existing) = unknown.iter_mut().find(|f| f.tool_id == label) {
                existing.absorb(observation.confidence);
            } else {
                unknown.push(ToolFinding::unknown(label, observation.confidence));
            }
        }

        ReducedFindings { known, unknown }
    }

    /// Reduces the observations and classifies each registry slot under `threshold`.
    pub fn classify(
        observations: &[DetectionObservation],
        threshold: Threshold,
    ) -> Vec<(ToolFinding, ToolStatus)> {
        Self::reduce(observations)
            .known
            .into_iter()
            .map(|finding| {
                let status = Self::status(finding.max_confidence, threshold);
                (finding, status)
            })
            .collect()
    }

    /// `detected` at or above the threshold, `uncertain` inside the warning band,
    /// `missing` below it. The band starts at `max(t - 0.15, 0.50)`.
    pub fn status(confidence: f64, threshold: Threshold) -> ToolStatus {
        if at_least(confidence, threshold.value()) {
            ToolStatus::Detected
        } else if at_least(confidence, threshold.warning_floor()) {
            ToolStatus::Uncertain
        } else {
            ToolStatus::Missing
        }
    }

    /// Every finding of the image (registry slots, then unknown labels) with its status.
    pub fn classify_image(image: &ImageResult, threshold: Threshold) -> Vec<ClassifiedFinding<'_>> {
        image
            .all_findings()
            .map(|finding| ClassifiedFinding {
                finding,
                status: Self::status(finding.max_confidence, threshold),
            })
            .collect()
    }

    pub fn detected_count(image: &ImageResult, threshold: Threshold) -> usize {
        image
            .findings
            .iter()
            .filter(|finding| Self::status(finding.max_confidence, threshold) == ToolStatus::Detected)
            .count()
    }

    pub fn verdict(image: &ImageResult, threshold: Threshold) -> ImageVerdict {
        if image.is_failed() {
            return ImageVerdict::Failed;
        }
        let detected = Self::detected_count(image, threshold);
        if detected >= REGISTRY_SIZE {
            ImageVerdict::AllFound
        } else if detected >= REVIEW_COUNT {
            ImageVerdict::NeedsReview
        } else {
            ImageVerdict::ManualRecount
        }
    }

    pub fn operation_status(overall_match: f64, threshold: Threshold) -> OperationStatus {
        match Self::status(overall_match, threshold) {
            ToolStatus::Detected => OperationStatus::Success,
            ToolStatus::Uncertain => OperationStatus::Warning,
            ToolStatus::Missing => OperationStatus::Error,
        }
    }

    /// Distinct tools visible in the image, registry order first.
    pub fn legend(image: &ImageResult) -> Vec<LegendEntry> {
        image
            .all_findings()
            .filter(|finding| finding.is_present())
            .map(|finding| LegendEntry {
                tool_id: finding.tool_id.clone(),
                label: finding.label.clone(),
                color: finding.color.clone(),
            })
            .collect()
    }
}

fn at_least(value: f64, bound: f64) -> bool {
    value + EPSILON >= bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TOOL_REGISTRY;

    fn threshold(value: f64) -> Threshold {
        Threshold::new(value).unwrap()
    }

    fn image_with(observations: &[DetectionObservation]) -> ImageResult {
        let reduced = ClassClassifier::reduce(observations);
        ImageResult {
            source_name: None,
            image_locator: None,
            findings: reduced.known,
            unknown_findings: reduced.unknown,
            error: None,
            detection_time_ms: None,
            image_confidence: None,
        }
    }

    #[test]
    fn duplicate_detections_collapse_to_max() {
        let observations = vec![
            DetectionObservation::new("Pliers", 0.3),
            DetectionObservation::new("Pliers", 0.7),
        ];
        let reduced = ClassClassifier::reduce(&observations);
        let slot = registry::resolve("Pliers").unwrap();
        assert_eq!(reduced.known[slot].max_confidence, 0.7);

        let reversed: Vec<_> = observations.into_iter().rev().collect();
        let reduced = ClassClassifier::reduce(&reversed);
        assert_eq!(reduced.known[slot].max_confidence, 0.7);
    }

    #[test]
    fn findings_follow_registry_order() {
        let observations = vec![
            DetectionObservation::new("Oil_can_opener", 0.9),
            DetectionObservation::new("Adjustable_wrench", 0.8),
        ];
        let reduced = ClassClassifier::reduce(&observations);
        assert_eq!(reduced.known.len(), REGISTRY_SIZE);
        for (finding, tool) in reduced.known.iter().zip(TOOL_REGISTRY.iter()) {
            assert_eq!(finding.tool_id, tool.key);
        }
        assert_eq!(reduced.known[0].max_confidence, 0.8);
        assert_eq!(reduced.known[REGISTRY_SIZE - 1].max_confidence, 0.9);
    }

    #[test]
    fn unknown_labels_are_kept_and_classified() {
        let observations = vec![
            DetectionObservation::new("Hammer", 0.9),
            DetectionObservation::new("Hammer", 0.4),
        ];
        let image = image_with(&observations);
        assert_eq!(image.unknown_findings.len(), 1);
        assert_eq!(image.unknown_findings[0].label, "Hammer");
        let classified = ClassClassifier::classify_image(&image, threshold(0.85));
        let hammer = classified.last().unwrap();
        assert_eq!(hammer.finding.tool_id, "Hammer");
        assert_eq!(hammer.status, ToolStatus::Detected);
    }

    #[test]
    fn uncertain_inside_warning_band() {
        assert_eq!(ClassClassifier::status(0.80, threshold(0.85)), ToolStatus::Uncertain);
        assert_eq!(ClassClassifier::status(0.70, threshold(0.85)), ToolStatus::Uncertain);
        assert_eq!(ClassClassifier::status(0.69, threshold(0.85)), ToolStatus::Missing);
    }

    #[test]
    fn detected_at_or_above_threshold() {
        assert_eq!(ClassClassifier::status(0.80, threshold(0.60)), ToolStatus::Detected);
        assert_eq!(ClassClassifier::status(0.85, threshold(0.85)), ToolStatus::Detected);
    }

    #[test]
    fn warning_band_is_floored_at_half() {
        assert_eq!(ClassClassifier::status(0.49, threshold(0.60)), ToolStatus::Missing);
        assert_eq!(ClassClassifier::status(0.50, threshold(0.60)), ToolStatus::Uncertain);
    }

    #[test]
    fn every_confidence_threshold_pair_gets_one_status() {
        for t in 0..=20 {
            let t = threshold(t as f64 / 20.0);
            for c in 0..=20 {
                let c = c as f64 / 20.0;
                let status = ClassClassifier::status(c, t);
                let expected = if c + EPSILON >= t.value() {
                    ToolStatus::Detected
                } else if c + EPSILON >= t.warning_floor() {
                    ToolStatus::Uncertain
                } else {
                    ToolStatus::Missing
                };
                assert_eq!(status, expected);
            }
        }
    }

    #[test]
    fn classify_reports_every_registry_slot() {
        let classified = ClassClassifier::classify(
            &[DetectionObservation::new("Pliers", 0.8)],
            threshold(0.85),
        );
        assert_eq!(classified.len(), REGISTRY_SIZE);
        let slot = registry::resolve("Pliers").unwrap();
        assert_eq!(classified[slot].1, ToolStatus::Uncertain);
        assert_eq!(classified[0].1, ToolStatus::Missing);
    }

    #[test]
    fn verdict_counts_detected_tools() {
        let all: Vec<_> = TOOL_REGISTRY
            .iter()
            .map(|tool| DetectionObservation::new(tool.key, 0.95))
            .collect();
        assert_eq!(ClassClassifier::verdict(&image_with(&all), threshold(0.85)), ImageVerdict::AllFound);

        let eight: Vec<_> = all.iter().take(8).cloned().collect();
        assert_eq!(ClassClassifier::verdict(&image_with(&eight), threshold(0.85)), ImageVerdict::NeedsReview);

        let two: Vec<_> = all.iter().take(2).cloned().collect();
        assert_eq!(ClassClassifier::verdict(&image_with(&two), threshold(0.85)), ImageVerdict::ManualRecount);

        let failed = ImageResult::failed(None, None, "boom");
        assert_eq!(ClassClassifier::verdict(&failed, threshold(0.85)), ImageVerdict::Failed);
    }

    #[test]
    fn legend_lists_present_tools_once() {
        let image = image_with(&[
            DetectionObservation::new("Pliers", 0.4),
            DetectionObservation::new("Pliers", 0.9),
            DetectionObservation::new("Hammer", 0.2),
            DetectionObservation::new("screwdriver_1", 0.0),
        ]);
        let legend = ClassClassifier::legend(&image);
        let ids: Vec<_> = legend.iter().map(|entry| entry.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["Pliers", "Hammer"]);
        assert_eq!(legend[0].color, "yellow");
        assert_eq!(legend[1].color, "red");
    }
}
