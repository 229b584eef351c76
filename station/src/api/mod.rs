pub mod client;
pub mod upload;

pub use client::DetectionClient;
pub use upload::{UploadFile, UploadPlan};

use serde_json::Value;
use std::future::Future;
use tooltrackcore::prelude::TransportError;

/// Recognition endpoints of the detection service; payloads come back raw.
pub trait DetectionApi: Send + Sync + 'static {
    fn detect_single(
        &self,
        file: &UploadFile,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;

    fn detect_archive(
        &self,
        file: &UploadFile,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}
