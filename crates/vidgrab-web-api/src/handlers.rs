use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error, info, warn};
use utoipa::{OpenApi, ToSchema};
use vidgrab_core::{DownloadOrchestrator, DownloadResult, ErrorKind, StorageStats};

use crate::{
    client::ClientId,
    config::{Config, ConfigSnapshot},
    problem::ProblemDetails,
};

const SERVICE_NAME: &str = "vidgrab";
const DOWNLOAD_STATUS: &str = "Downloaded successfully";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<DownloadOrchestrator>,
}

#[derive(Deserialize, Serialize, ToSchema, Clone, Debug)]
pub struct DownloadRequest {
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct DownloadResponse {
    #[serde(flatten)]
    pub result: DownloadResult,
    #[schema(example = "Downloaded successfully")]
    pub status: String,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub storage_dir: String,
    pub max_duration_seconds: u64,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct DocsResponse {
    pub message: String,
    pub endpoints: BTreeMap<String, String>,
    pub limits: ConfigSnapshot,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub storage: StorageStats,
    pub tracked_clients: usize,
    pub config: ConfigSnapshot,
}

#[derive(OpenApi)]
#[openapi(
    paths(home, health_check, status, download, openapi_json),
    components(
        schemas(DownloadRequest),
        schemas(DownloadResponse),
        schemas(DownloadResult),
        schemas(HealthResponse),
        schemas(DocsResponse),
        schemas(StatusResponse),
        schemas(StorageStats),
        schemas(ConfigSnapshot)
    ),
    tags(
        (name = "vidgrab", description = "Media download API")
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service documentation", body = DocsResponse),
    )
)]
pub async fn home(State(state): State<AppState>) -> Json<DocsResponse> {
    debug!("GET / called");

    let endpoints = [
        ("GET /", "API documentation"),
        ("GET /health", "Health check"),
        ("GET /status", "Storage and configuration status"),
        ("POST /download", "Download a video: {\"url\": \"https://...\"}"),
        ("GET /openapi.json", "OpenAPI specification"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Json(DocsResponse {
        message: "Video Downloader API".to_string(),
        endpoints,
        limits: state.config.snapshot(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("GET /health called");

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: Utc::now(),
        storage_dir: state.config.storage_dir.display().to_string(),
        max_duration_seconds: state.config.max_duration_seconds,
    })
}

#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Storage statistics and configuration", body = StatusResponse),
        (status = 500, description = "Storage directory could not be read"),
    )
)]
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ProblemDetails> {
    debug!("GET /status called");

    let storage = StorageStats::collect(&state.config.storage_dir)
        .await
        .map_err(|e| {
            error!(
                "Failed to read storage directory {}: {}",
                state.config.storage_dir.display(),
                e
            );
            ProblemDetails::new(StatusCode::INTERNAL_SERVER_ERROR)
                .with_error("Failed to read storage directory")
        })?;

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        storage,
        tracked_clients: state.orchestrator.rate_limiter().tracked_clients(),
        config: state.config.snapshot(),
    }))
}

#[utoipa::path(
    post,
    path = "/download",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Video downloaded", body = DownloadResponse),
        (status = 400, description = "Missing or invalid URL, unresolvable media, or duration over the limit"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 500, description = "Download failed"),
    )
)]
pub async fn download(
    State(state): State<AppState>,
    client: ClientId,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Json<DownloadResponse>, ProblemDetails> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected download request body: {}", rejection.body_text());
            return Err(ProblemDetails::new(StatusCode::BAD_REQUEST)
                .with_error("Invalid request body")
                .with_detail("details", rejection.body_text()));
        }
    };
    let url = request.url.unwrap_or_default();
    debug!("POST /download called by '{}' with url: {}", client.as_str(), url);

    match state.orchestrator.handle(&url, client.as_str()).await {
        Ok(result) => {
            info!(
                "Downloaded '{}' as {} for '{}'",
                result.title,
                result.filename,
                client.as_str()
            );
            Ok(Json(DownloadResponse {
                result,
                status: DOWNLOAD_STATUS.to_string(),
            }))
        }
        Err(e) => {
            match e.kind() {
                ErrorKind::Server => error!("Download for '{}' failed: {}", client.as_str(), e),
                ErrorKind::ClientInput | ErrorKind::RateLimit => {
                    warn!("Download for '{}' rejected: {}", client.as_str(), e)
                }
            }
            Err(ProblemDetails::from(&e))
        }
    }
}

#[utoipa::path(
    get,
    path = "/openapi.json",
    responses(
        (status = 200, description = "OpenAPI specification", body = String),
    )
)]
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    debug!("GET /openapi.json called");
    Json(ApiDoc::openapi())
}
