//! HTTP surface: routes, response bodies and error mapping.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::clock::format_iso;
use crate::entry::{DeviceKind, Entry, Payload};
use crate::error::{SinkError, SinkResult};
use crate::service::TelemetrySink;

type SharedSink = Arc<TelemetrySink>;

pub fn router(sink: SharedSink) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/data/espa", get(active_handler).post(ingest_handler))
        .route("/data/history/espa", get(history_handler))
        // device bodies are arbitrary; no size cap
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(sink)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    sink: SharedSink,
    shutdown: CancellationToken,
) -> SinkResult<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("ESP BLE sink listening on {}", addr);
    }
    axum::serve(listener, router(sink).into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// A [`SinkError`] paired with the status code it is reported under.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: SinkError,
}

impl ApiError {
    fn bad_request(error: SinkError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl From<SinkError> for ApiError {
    fn from(error: SinkError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error",
            message: self.error.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
struct Endpoints {
    #[serde(rename = "POST /data/espa")]
    post_data: &'static str,
    #[serde(rename = "GET /data/espa")]
    get_data: &'static str,
    #[serde(rename = "GET /data/history/espa")]
    get_history: &'static str,
}

#[derive(Debug, Serialize)]
struct RootResponse {
    status: &'static str,
    endpoints: Endpoints,
    active_devices: usize,
}

async fn root_handler(State(sink): State<SharedSink>) -> Result<Json<RootResponse>, ApiError> {
    Ok(Json(RootResponse {
        status: "ESP BLE Server is running",
        endpoints: Endpoints {
            post_data: "Send BLE data",
            get_data: "Get current BLE data",
            get_history: "Get all history",
        },
        active_devices: sink.active_count()?,
    }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    active_devices: usize,
}

async fn health_handler(State(sink): State<SharedSink>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "healthy",
        timestamp: format_iso(sink.now()),
        active_devices: sink.active_count()?,
    }))
}

#[derive(Debug, Serialize)]
struct ActiveResponse {
    esp_type: DeviceKind,
    active_devices: usize,
    devices: Vec<Arc<Entry>>,
    timestamp: String,
}

async fn active_handler(State(sink): State<SharedSink>) -> Result<Json<ActiveResponse>, ApiError> {
    let view = sink.active_view()?;
    Ok(Json(ActiveResponse {
        esp_type: sink.kind(),
        active_devices: view.entries.len(),
        devices: view.entries,
        timestamp: format_iso(view.as_of),
    }))
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    status: &'static str,
    message: String,
    received: Payload,
    timestamp: String,
}

async fn ingest_handler(
    State(sink): State<SharedSink>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let result = body
        .map_err(|rejection| SinkError::Body(rejection.body_text()))
        .and_then(|bytes| sink.ingest(&bytes));

    match result {
        Ok(receipt) => Ok(Json(IngestResponse {
            status: "success",
            message: format!("{} data received", sink.kind().as_str()),
            received: receipt.received,
            timestamp: receipt.timestamp,
        })),
        Err(e) => {
            warn!("Error processing {} data: {}", sink.kind().as_str(), e);
            Err(ApiError::bad_request(e))
        }
    }
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    esp_type: DeviceKind,
    total_logs: usize,
    logs: Vec<Arc<Entry>>,
}

async fn history_handler(
    State(sink): State<SharedSink>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let logs = sink.history()?;
    Ok(Json(HistoryResponse {
        esp_type: sink.kind(),
        total_logs: logs.len(),
        logs,
    }))
}
