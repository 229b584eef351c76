use crate::wire::value::{first_number, first_str, non_empty_str, number, unit_fraction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LABEL_KEYS: [&str; 4] = ["label", "name", "class", "class_name"];
const CONFIDENCE_KEYS: [&str; 2] = ["confidence", "conf"];

/// A single raw detection reported by the server for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionObservation {
    pub label: String,
    /// Always a fraction in `[0, 1]`.
    pub confidence: f64,
}

impl DetectionObservation {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence: unit_fraction(confidence),
        }
    }

    /// Parses an object (`{label|name|class|class_name, confidence|conf}`) or a
    /// positional `[label, confidence]` / `[label, _, confidence]` array.
    ///
    /// Returns `None` when no label can be found.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(object) => {
                let label = first_str(object, &LABEL_KEYS)?;
                let confidence = first_number(object, &CONFIDENCE_KEYS).unwrap_or(0.0);
                Some(Self::new(label, confidence))
            }
            Value::Array(items) => {
                let label = items.first().and_then(non_empty_str)?;
                let confidence = items
                    .iter()
                    .skip(1)
                    .take(2)
                    .find_map(|item| match item {
                        Value::Number(_) => number(item),
                        _ => None,
                    })
                    .unwrap_or(0.0);
                Some(Self::new(label, confidence))
            }
            _ => None,
        }
    }

    /// Parses a detection list; a lone object counts as a one-element list.
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items.iter().filter_map(Self::from_value).collect(),
            Value::Object(_) => Self::from_value(value).into_iter().collect(),
            _ => Vec::new(),
        }
    }
}
