use crate::gui_bridge::model::DashboardModel;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tooltrackcore::normalizer::{export_operation, OperationResult};
use tooltrackcore::prelude::SettingsService;
use tooltrackcore::telemetry::LogManager;
use tooltrackcore::threshold::ThresholdController;
use warp::{http::StatusCode, Filter, Rejection, Reply};

fn bridge_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[derive(Debug, Deserialize)]
struct ThresholdRequest {
    value: f64,
}

/// HTTP surface of the dashboard: the current operation plus the threshold slider.
pub struct DashboardBridge<S: SettingsService> {
    operation: Arc<RwLock<OperationResult>>,
    controller: ThresholdController<S>,
    logger: LogManager,
}

impl<S: SettingsService> DashboardBridge<S> {
    pub fn new(controller: ThresholdController<S>) -> Self {
        Self {
            operation: Arc::new(RwLock::new(OperationResult::default())),
            controller,
            logger: LogManager::new("bridge"),
        }
    }

    /// Replaces the operation shown on the dashboard.
    pub fn publish(&self, operation: OperationResult) {
        self.logger.record(&format!(
            "publishing operation with {} images",
            operation.images.len()
        ));
        let mut guard = self.operation.write().unwrap_or_else(PoisonError::into_inner);
        *guard = operation;
    }

    pub fn current(&self) -> OperationResult {
        self.operation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone + Send + Sync + 'static {
        let operation = Arc::clone(&self.operation);
        let operation_filter = warp::any().map(move || Arc::clone(&operation));
        let controller = self.controller.clone();
        let controller_filter = warp::any().map(move || controller.clone());

        let results_route = warp::path("results")
            .and(warp::path::end())
            .and(warp::get())
            .and(operation_filter.clone())
            .and(controller_filter.clone())
            .map(
                |operation: Arc<RwLock<OperationResult>>, controller: ThresholdController<S>| {
                    let guard = operation.read().unwrap_or_else(PoisonError::into_inner);
                    warp::reply::json(&DashboardModel::build(&guard, controller.snapshot()))
                },
            );

        let export_route = warp::path("export")
            .and(warp::path::end())
            .and(warp::get())
            .and(operation_filter)
            .and(controller_filter.clone())
            .map(
                |operation: Arc<RwLock<OperationResult>>, controller: ThresholdController<S>| {
                    let snapshot = operation
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone()
                        .with_threshold(controller.pending());
                    warp::reply::json(&export_operation(&snapshot))
                },
            );

        let get_threshold = warp::path("threshold")
            .and(warp::path::end())
            .and(warp::get())
            .and(controller_filter.clone())
            .map(|controller: ThresholdController<S>| warp::reply::json(&controller.snapshot()));

        let post_threshold = warp::path("threshold")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(controller_filter)
            .map(
                |request: ThresholdRequest, controller: ThresholdController<S>| {
                    match controller.set_pending(request.value) {
                        Ok(_) => warp::reply::with_status(
                            warp::reply::json(&controller.snapshot()),
                            StatusCode::ACCEPTED,
                        ),
                        Err(err) => warp::reply::with_status(
                            warp::reply::json(&json!({"error": err.to_string()})),
                            StatusCode::BAD_REQUEST,
                        ),
                    }
                },
            );

        results_route
            .or(export_route)
            .or(get_threshold)
            .or(post_threshold)
    }

    /// Serves until Ctrl+C.
    pub async fn serve(&self, port: u16) -> Result<(), warp::Error> {
        let (addr, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(bridge_address(port), async {
                let _ = tokio::signal::ctrl_c().await;
            })?;
        self.logger
            .record(&format!("dashboard bridge listening on http://{}", addr));
        server.await;
        Ok(())
    }
}
