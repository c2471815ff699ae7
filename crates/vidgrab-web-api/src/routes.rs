use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;
use vidgrab_core::DownloadOrchestrator;

use crate::{
    config::Config,
    handlers::{AppState, download, health_check, home, openapi_json, status},
    middleware::rate_limit_headers_middleware,
};

fn cors_layer(config: &Config) -> CorsLayer {
    let allow_all = || {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
            .allow_origin(Any)
    };

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return allow_all();
    }

    let origins: Result<Vec<_>, _> = config
        .cors_origins
        .iter()
        .map(|origin| origin.parse())
        .collect();

    match origins {
        Ok(origins) => CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
            .allow_origin(origins),
        Err(_) => {
            warn!("Invalid CORS origins, falling back to allow all");
            allow_all()
        }
    }
}

pub fn create_router(config: Arc<Config>, orchestrator: Arc<DownloadOrchestrator>) -> Router {
    let cors = cors_layer(&config);
    let state = AppState {
        config,
        orchestrator: Arc::clone(&orchestrator),
    };

    let download_routes = Router::new()
        .route("/download", post(download))
        .layer(middleware::from_fn_with_state(
            Arc::clone(orchestrator.rate_limiter()),
            rate_limit_headers_middleware,
        ));

    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/openapi.json", get(openapi_json))
        .merge(download_routes)
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use std::{
        path::{Path, PathBuf},
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };
    use tower::ServiceExt;
    use vidgrab_core::{
        FetchError, FetchedMedia, FormatPreference, MediaFetcher, ProbeResult, RateLimitConfig,
        RateLimiter,
    };

    struct FakeFetcher {
        title: String,
        duration: Option<u64>,
        resolvable: bool,
        fetch_ok: bool,
        fetches: AtomicUsize,
    }

    impl FakeFetcher {
        fn new(title: &str, duration: Option<u64>) -> Self {
            Self {
                title: title.to_string(),
                duration,
                resolvable: true,
                fetch_ok: true,
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaFetcher for FakeFetcher {
        async fn probe(&self, _url: &str) -> Result<ProbeResult, FetchError> {
            if !self.resolvable {
                return Err(FetchError::Failed {
                    status: "exit status: 1".to_string(),
                    detail: "ERROR: Private video".to_string(),
                });
            }
            Ok(ProbeResult {
                title: self.title.clone(),
                uploader: Some("Test Channel".to_string()),
                duration_seconds: self.duration,
            })
        }

        async fn fetch(
            &self,
            _url: &str,
            output_template: &Path,
            _format: &FormatPreference,
        ) -> Result<FetchedMedia, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.fetch_ok {
                return Err(FetchError::Timeout(Duration::from_secs(1)));
            }
            let resolved_path =
                PathBuf::from(output_template.to_string_lossy().replace("%(ext)s", "mp4"));
            std::fs::write(&resolved_path, vec![0u8; 2048]).unwrap();
            Ok(FetchedMedia { resolved_path })
        }
    }

    struct TestApp {
        router: Router,
        fetcher: Arc<FakeFetcher>,
        dir: tempfile::TempDir,
    }

    fn test_app(fetcher: FakeFetcher, max_requests: usize) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            storage_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        config.rate_limit = RateLimitConfig {
            max_requests_per_client: max_requests,
            window: Duration::from_secs(60 * 60),
        };

        let fetcher = Arc::new(fetcher);
        let orchestrator = DownloadOrchestrator::new(
            Arc::clone(&fetcher) as Arc<dyn MediaFetcher>,
            Arc::new(RateLimiter::new(config.rate_limit.clone())),
            config.orchestrator_config(),
        );

        TestApp {
            router: create_router(Arc::new(config), Arc::new(orchestrator)),
            fetcher,
            dir,
        }
    }

    fn download_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/download")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(FakeFetcher::new("t", None), 10);
        let response = app
            .router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "vidgrab");
        assert_eq!(body["max_duration_seconds"], 3600);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_home_lists_endpoints() {
        let app = test_app(FakeFetcher::new("t", None), 10);
        let response = app
            .router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["endpoints"]["POST /download"].is_string());
        assert_eq!(body["limits"]["max_requests_per_client"], 10);
    }

    #[tokio::test]
    async fn test_status_counts_files() {
        let app = test_app(FakeFetcher::new("t", None), 10);
        std::fs::write(app.dir.path().join("one.mp4"), b"1").unwrap();

        let response = app
            .router
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["storage"]["file_count"], 1);
        assert_eq!(body["storage"]["exists"], true);
        assert_eq!(body["config"]["max_duration_seconds"], 3600);
    }

    #[tokio::test]
    async fn test_openapi_json() {
        let app = test_app(FakeFetcher::new("t", None), 10);
        let response = app
            .router
            .oneshot(Request::builder().uri("/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["paths"]["/download"]["post"].is_object());
    }

    #[tokio::test]
    async fn test_download_empty_url() {
        let app = test_app(FakeFetcher::new("t", None), 10);
        let response = app.router.oneshot(download_request(r#"{"url": ""}"#)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No URL provided");
    }

    #[tokio::test]
    async fn test_download_missing_url_field() {
        let app = test_app(FakeFetcher::new("t", None), 10);
        let response = app.router.oneshot(download_request("{}")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No URL provided");
    }

    #[tokio::test]
    async fn test_download_malformed_body() {
        let app = test_app(FakeFetcher::new("t", None), 10);
        let response = app.router.oneshot(download_request("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn test_download_invalid_scheme() {
        let app = test_app(FakeFetcher::new("t", None), 10);
        let response = app
            .router
            .oneshot(download_request(r#"{"url": "ftp://x"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Invalid URL format");
    }

    #[tokio::test]
    async fn test_download_unresolvable_url() {
        let fetcher = FakeFetcher {
            resolvable: false,
            ..FakeFetcher::new("t", None)
        };
        let app = test_app(fetcher, 10);
        let response = app
            .router
            .oneshot(download_request(r#"{"url": "https://example.com/private"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Could not retrieve video information");
        assert_eq!(app.fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_download_too_long() {
        let app = test_app(FakeFetcher::new("Long", Some(4000)), 10);
        let response = app
            .router
            .oneshot(download_request(r#"{"url": "https://example.com/long"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["max_duration"], 3600);
        assert_eq!(body["duration"], 4000);
        assert_eq!(app.fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_download_fetch_failure() {
        let fetcher = FakeFetcher {
            fetch_ok: false,
            ..FakeFetcher::new("t", Some(10))
        };
        let app = test_app(fetcher, 10);
        let response = app
            .router
            .oneshot(download_request(r#"{"url": "https://example.com/v"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Failed to download video");
    }

    #[tokio::test]
    async fn test_download_success() {
        let app = test_app(FakeFetcher::new("Test: Video!", Some(120)), 10);
        let response = app
            .router
            .oneshot(download_request(r#"{"url": "https://example.com/watch?v=1"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-RateLimit-Used").unwrap(), "1");
        assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "9");

        let body = json_body(response).await;
        assert_eq!(body["title"], "Test: Video!");
        assert_eq!(body["uploader"], "Test Channel");
        assert_eq!(body["filename"], "Test_ Video_.mp4");
        assert_eq!(body["duration"], 120);
        assert_eq!(body["file_size"], 2048);
        assert_eq!(body["status"], "Downloaded successfully");
        assert!(body["completed_at"].is_string());
    }

    #[tokio::test]
    async fn test_download_rate_limited_on_eleventh_request() {
        let app = test_app(FakeFetcher::new("clip", Some(5)), 10);

        for i in 1..=10 {
            let response = app
                .router
                .clone()
                .oneshot(download_request(r#"{"url": "https://example.com/clip"}"#))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i);
        }

        let response = app
            .router
            .clone()
            .oneshot(download_request(r#"{"url": "https://example.com/clip"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "0");
        let body = json_body(response).await;
        assert_eq!(body["error"], "Rate limit exceeded");
        assert_eq!(body["limit"], 10);
        assert_eq!(body["window_seconds"], 3600);
        assert_eq!(app.fetcher.fetches.load(Ordering::SeqCst), 10);
    }
}
