use serde::{Deserialize, Serialize};

/// Body of `POST /settings`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub confidence_threshold: f64,
}

/// Body of `GET /settings`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub confidence_threshold: f64,
}
