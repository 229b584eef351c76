use crate::api::upload::UploadFile;
use crate::api::DetectionApi;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tooltrackcore::normalizer::ApiBase;
use tooltrackcore::prelude::{SettingsService, Threshold, TransportError};
use tooltrackcore::telemetry::LogManager;
use tooltrackcore::wire::{HistoryResponse, HistoryStatistics, SettingsResponse, SettingsUpdate};

/// Longest response body quoted in an error.
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP client for the detection service and the history service.
#[derive(Debug, Clone)]
pub struct DetectionClient {
    http: Client,
    api_base: ApiBase,
    history_base: ApiBase,
    toolset: Option<String>,
    logger: LogManager,
}

impl DetectionClient {
    pub fn new(api_base: ApiBase, history_base: ApiBase, timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        Ok(Self {
            http,
            api_base,
            history_base,
            toolset: None,
            logger: LogManager::new("client"),
        })
    }

    /// Tool set name sent alongside every upload.
    pub fn with_toolset(mut self, toolset: impl Into<String>) -> Self {
        self.toolset = Some(toolset.into());
        self
    }

    pub async fn history(&self, page: u32, limit: u32) -> Result<HistoryResponse, TransportError> {
        let url = self.history_base.join("api/history");
        let response = self
            .http
            .get(&url)
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await
            .map_err(transport)?;
        typed_or_error(response).await
    }

    /// Raw operation payload; feed it to the normalizer.
    pub async fn operation(&self, operation_id: &str) -> Result<Value, TransportError> {
        let url = self.history_base.join(&format!("api/history/{}", operation_id));
        self.get_json(&url).await
    }

    pub async fn statistics(&self) -> Result<HistoryStatistics, TransportError> {
        let url = self.history_base.join("api/statistics/history");
        let response = self.http.get(&url).send().await.map_err(transport)?;
        typed_or_error(response).await
    }

    pub async fn image_bytes(&self, image_id: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.history_base.join(&format!("api/images/{}", image_id));
        let response = self.http.get(&url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body));
        }
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }

    async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        let response = self.http.get(url).send().await.map_err(transport)?;
        json_or_error(response).await
    }

    async fn upload(&self, route: &str, file: &UploadFile) -> Result<Value, TransportError> {
        let url = self.api_base.join(route);
        let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        let mut form = Form::new().part("file", part);
        if let Some(toolset) = &self.toolset {
            form = form.text("toolset", toolset.clone());
        }
        self.logger
            .detail(&format!("POST {} ({}, {} bytes)", url, file.name, file.bytes.len()));
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        json_or_error(response).await
    }
}

impl DetectionApi for DetectionClient {
    fn detect_single(
        &self,
        file: &UploadFile,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send {
        self.upload("detect/single", file)
    }

    fn detect_archive(
        &self,
        file: &UploadFile,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send {
        self.upload("detect/archive", file)
    }
}

impl SettingsService for DetectionClient {
    fn fetch_threshold(&self) -> impl Future<Output = Result<Threshold, TransportError>> + Send {
        async move {
            let url = self.api_base.join("settings");
            let response = self.http.get(&url).send().await.map_err(transport)?;
            let settings: SettingsResponse = typed_or_error(response).await?;
            Threshold::from_fraction_or_percent(settings.confidence_threshold)
                .map_err(|err| TransportError::Decode(err.to_string()))
        }
    }

    fn push_threshold(
        &self,
        value: Threshold,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            let url = self.api_base.join("settings");
            let response = self
                .http
                .post(&url)
                .json(&SettingsUpdate {
                    confidence_threshold: value.value(),
                })
                .send()
                .await
                .map_err(transport)?;
            json_or_error(response).await.map(|_| ())
        }
    }
}

fn transport(err: reqwest::Error) -> TransportError {
    if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
        TransportError::Status {
            status: status.as_u16(),
            body: err.to_string(),
        }
    } else {
        TransportError::Connect(err.to_string())
    }
}

fn status_error(status: u16, body: &str) -> TransportError {
    TransportError::Status {
        status,
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    }
}

async fn json_or_error(response: Response) -> Result<Value, TransportError> {
    let status = response.status();
    let body = response.text().await.map_err(transport)?;
    if !status.is_success() {
        return Err(status_error(status.as_u16(), &body));
    }
    serde_json::from_str(&body).map_err(|err| TransportError::Decode(err.to_string()))
}

async fn typed_or_error<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let value = json_or_error(response).await?;
    serde_json::from_value(value).map_err(|err| TransportError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warp::Filter;

    async fn fake_server() -> ApiBase {
        let detect = warp::path!("detect" / "single")
            .and(warp::post())
            .and(warp::header::<String>("content-type"))
            .map(|content_type: String| {
                warp::reply::json(&json!({
                    "detections": [{"class": "Pliers", "confidence": 0.91}],
                    "image_path": "static/results/out.jpg",
                    "multipart": content_type.starts_with("multipart/form-data"),
                }))
            });
        let archive = warp::path!("detect" / "archive").and(warp::post()).map(|| {
            warp::reply::with_status("archive too large", warp::http::StatusCode::PAYLOAD_TOO_LARGE)
        });
        let get_settings = warp::path!("settings")
            .and(warp::get())
            .map(|| warp::reply::json(&json!({"confidence_threshold": 85})));
        let post_settings = warp::path!("settings")
            .and(warp::post())
            .and(warp::body::json())
            .map(|update: SettingsUpdate| {
                warp::reply::json(&json!({"status": "ok", "echo": update.confidence_threshold}))
            });
        let history = warp::path!("api" / "history")
            .and(warp::get())
            .map(|| {
                warp::reply::json(&json!({"operations": [
                    {"id": 7, "timestamp": "2024-05-01T10:00:00", "imageCount": "3",
                     "detectionTime": 1200.5, "overallMatch": 92, "recognition": 0.85}
                ]}))
            });
        let statistics = warp::path!("api" / "statistics" / "history").map(|| {
            warp::reply::json(&json!({"totalOperations": 4, "totalImages": 10,
                "averageProcessingTime": 350.0, "averageAccuracy": 88.5}))
        });
        let image = warp::path!("api" / "images" / String).map(|_id: String| vec![1u8, 2, 3]);

        let routes = detect
            .or(archive)
            .or(get_settings)
            .or(post_settings)
            .or(history)
            .or(statistics)
            .or(image);
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        ApiBase::parse(&format!("http://{}", addr)).unwrap()
    }

    async fn client() -> DetectionClient {
        let base = fake_server().await;
        DetectionClient::new(base.clone(), base, Duration::from_secs(5))
            .unwrap()
            .with_toolset("bench")
    }

    #[tokio::test]
    async fn single_upload_is_sent_as_multipart() {
        let client = client().await;
        let payload = client
            .detect_single(&UploadFile::new("bench.jpg", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(payload["multipart"], true);
        assert_eq!(payload["detections"][0]["class"], "Pliers");
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let client = client().await;
        let err = client
            .detect_archive(&UploadFile::new("set.zip", vec![0]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Status {
                status: 413,
                body: "archive too large".into()
            }
        );
    }

    #[tokio::test]
    async fn settings_round_trip_through_service() {
        let client = client().await;
        let threshold = client.fetch_threshold().await.unwrap();
        assert!((threshold.value() - 0.85).abs() < 1e-12);
        client
            .push_threshold(Threshold::new(0.9).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn history_endpoints_decode_leniently() {
        let client = client().await;
        let history = client.history(1, 20).await.unwrap();
        assert_eq!(history.operations.len(), 1);
        assert_eq!(history.operations[0].id, "7");
        assert_eq!(history.operations[0].image_count, 3.0);

        let statistics = client.statistics().await.unwrap();
        assert_eq!(statistics.total_operations, 4.0);

        assert_eq!(client.image_bytes("abc").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn unreachable_server_is_connect_error() {
        let base = ApiBase::parse("http://127.0.0.1:9").unwrap();
        let client = DetectionClient::new(base.clone(), base, Duration::from_secs(2)).unwrap();
        let err = client.fetch_threshold().await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
