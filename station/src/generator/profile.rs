use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tooltrackcore::registry::TOOL_REGISTRY;

/// Server response layout to imitate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadStyle {
    /// One object with a `detections` list of keyed objects.
    Single,
    /// One object whose detections are `[label, box, confidence]` arrays.
    Positional,
    /// `{"results": [...]}` with one entry per image.
    Archive,
}

/// Configuration for generating synthetic detection payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub style: PayloadStyle,
    pub images: usize,
    pub seed: u64,
    /// Probability that a registry tool is left out of an image.
    pub miss_rate: f64,
    /// Extra lower-confidence duplicates per detected tool.
    pub duplicates: usize,
    /// Adds one failed entry to archive payloads.
    pub failed_entry: bool,
    pub percent_confidences: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            style: PayloadStyle::Archive,
            images: 3,
            seed: 0,
            miss_rate: 0.2,
            duplicates: 1,
            failed_entry: true,
            percent_confidences: false,
        }
    }
}

struct PayloadBuilder {
    config: GeneratorConfig,
    rng: StdRng,
}

impl PayloadBuilder {
    fn new(config: &GeneratorConfig) -> Self {
        Self {
            config: config.clone(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn confidence(&mut self, low: f64, high: f64) -> f64 {
        let value = self.rng.gen_range(low..high);
        let value = (value * 1000.0).round() / 1000.0;
        if self.config.percent_confidences {
            (value * 1000.0).round() / 10.0
        } else {
            value
        }
    }

    fn detections(&mut self, positional: bool) -> Vec<Value> {
        let miss_rate = if self.config.miss_rate.is_nan() {
            0.0
        } else {
            self.config.miss_rate.clamp(0.0, 1.0)
        };
        let mut detections = Vec::new();
        for tool in TOOL_REGISTRY.iter() {
            if self.rng.gen_bool(miss_rate) {
                continue;
            }
            let best = self.confidence(0.55, 0.99);
            let mut confidences = vec![best];
            for _ in 0..self.config.duplicates {
                confidences.push(self.confidence(0.05, 0.5));
            }
            for confidence in confidences {
                let x = self.rng.gen_range(0..1200);
                let y = self.rng.gen_range(0..900);
                let bbox = json!([x, y, x + 120, y + 60]);
                detections.push(if positional {
                    json!([tool.key, bbox, confidence])
                } else {
                    json!({"class": tool.key, "confidence": confidence, "bbox": bbox})
                });
            }
        }
        detections
    }

    fn image(&mut self, idx: usize, positional: bool) -> Value {
        json!({
            "detections": self.detections(positional),
            "image_path": format!("static/results/detected_{}.jpg", idx + 1),
            "detection_time": self.rng.gen_range(150.0..900.0_f64).round(),
        })
    }

    fn build(mut self) -> Value {
        match self.config.style {
            PayloadStyle::Single => self.image(0, false),
            PayloadStyle::Positional => self.image(0, true),
            PayloadStyle::Archive => {
                let images = self.config.images.max(1);
                let mut results: Vec<Value> = (0..images)
                    .map(|idx| {
                        json!({
                            "filename": format!("image_{}.jpg", idx + 1),
                            "result": self.image(idx, idx % 2 == 1),
                        })
                    })
                    .collect();
                if self.config.failed_entry {
                    results.push(json!({
                        "filename": format!("image_{}.jpg", images + 1),
                        "error": "Server responded with status 502",
                    }));
                }
                json!({ "results": results })
            }
        }
    }
}

pub fn build_payload_from_config(config: &GeneratorConfig) -> Value {
    PayloadBuilder::new(config).build()
}

pub fn build_payload(style: PayloadStyle, seed: u64) -> Value {
    let config = GeneratorConfig {
        style,
        seed,
        ..Default::default()
    };
    build_payload_from_config(&config)
}
