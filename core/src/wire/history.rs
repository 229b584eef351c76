use crate::normalizer::classifier::{ClassClassifier, OperationStatus};
use crate::prelude::Threshold;
use crate::wire::value::{number, unit_fraction};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One row of `GET /api/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    #[serde(deserialize_with = "lenient_text")]
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub image_count: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub detection_time: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub overall_match: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub recognition: f64,
}

impl HistorySummary {
    /// Threshold recorded with the operation, falling back to the default when unset.
    pub fn threshold(&self) -> Threshold {
        if self.recognition > 0.0 {
            Threshold::from_fraction_or_percent(self.recognition).unwrap_or_default()
        } else {
            Threshold::DEFAULT
        }
    }

    pub fn status(&self) -> OperationStatus {
        ClassClassifier::operation_status(unit_fraction(self.overall_match), self.threshold())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub operations: Vec<HistorySummary>,
}

/// Body of `GET /api/statistics/history`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatistics {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_operations: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_images: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_processing_time: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_accuracy: f64,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number(&value).unwrap_or(0.0))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_accepts_numbers_and_numeric_strings() {
        let body = r#"{"operations":[
            {"id": 7, "timestamp": "2025-05-01T10:00:00", "imageCount": "3",
             "detectionTime": "1200", "overallMatch": 0.9, "recognition": 0.85}
        ]}"#;
        let parsed: HistoryResponse = serde_json::from_str(body).unwrap();
        let row = &parsed.operations[0];
        assert_eq!(row.id, "7");
        assert_eq!(row.image_count, 3.0);
        assert_eq!(row.detection_time, 1200.0);
        assert_eq!(row.status(), OperationStatus::Success);
    }

    #[test]
    fn status_uses_dynamic_band_not_fixed_cutoffs() {
        let row = HistorySummary {
            id: "1".into(),
            timestamp: String::new(),
            image_count: 1.0,
            detection_time: 0.0,
            overall_match: 0.80,
            recognition: 0.60,
        };
        // A fixed 85% cutoff would have flagged this as a warning.
        assert_eq!(row.status(), OperationStatus::Success);
    }

    #[test]
    fn missing_recognition_defaults_to_half() {
        let row: HistorySummary = serde_json::from_str(r#"{"id": "a", "overallMatch": null}"#).unwrap();
        assert_eq!(row.threshold(), Threshold::DEFAULT);
        assert_eq!(row.status(), OperationStatus::Error);
    }

    #[test]
    fn statistics_tolerate_missing_fields() {
        let stats: HistoryStatistics =
            serde_json::from_str(r#"{"totalOperations": 4, "averageAccuracy": "0.91"}"#).unwrap();
        assert_eq!(stats.total_operations, 4.0);
        assert_eq!(stats.total_images, 0.0);
        assert_eq!(stats.average_accuracy, 0.91);
    }
}
