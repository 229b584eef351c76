use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tooltrackcore::normalizer::ApiBase;
use tooltrackcore::prelude::Threshold;

fn default_debounce_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_bridge_port() -> u16 {
    9000
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StationConfig {
    pub api_base: ApiBase,
    /// Defaults to `api_base` when the history service is co-hosted.
    #[serde(default)]
    pub history_base: Option<ApiBase>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Used only when the settings service cannot be reached at startup.
    #[serde(default)]
    pub initial_threshold: Option<Threshold>,
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,
    #[serde(default)]
    pub toolset: Option<String>,
}

impl StationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading station config {}", path_ref.display()))?;
        let config: StationConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing station config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(api_base: &str, history_base: Option<&str>) -> anyhow::Result<Self> {
        let api_base = ApiBase::parse(api_base).context("parsing --api-base")?;
        let history_base = history_base
            .map(ApiBase::parse)
            .transpose()
            .context("parsing --history-base")?;
        Ok(Self {
            api_base,
            history_base,
            debounce_ms: default_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            initial_threshold: None,
            bridge_port: default_bridge_port(),
            toolset: None,
        })
    }

    pub fn history_base(&self) -> &ApiBase {
        self.history_base.as_ref().unwrap_or(&self.api_base)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn fallback_threshold(&self) -> Threshold {
        self.initial_threshold.unwrap_or_default()
    }
}
