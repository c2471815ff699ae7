use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vidgrab_core::{DownloadOrchestrator, RateLimiter, RetentionSweeper, YtDlp};

use crate::{
    cleanup::CleanupService,
    config::{Config, LogFormat},
    routes::create_router,
};

pub fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into());

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer())
                .init();
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting vidgrab-web-api server with config: {:?}", config);
    let config = Arc::new(config);

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let fetcher = YtDlp::new(&config.ytdlp_path).with_timeout(config.fetch_timeout);
    let orchestrator = Arc::new(DownloadOrchestrator::new(
        Arc::new(fetcher),
        Arc::clone(&rate_limiter),
        config.orchestrator_config(),
    ));

    let trace = TraceLayer::new_for_http().on_response(
        |response: &axum::response::Response, latency: Duration, _span: &tracing::Span| {
            tracing::info!(
                "response latency: {:?}, status: {}",
                latency,
                response.status()
            );
        },
    );
    let app = create_router(Arc::clone(&config), orchestrator).layer(ServiceBuilder::new().layer(trace));

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| format!("Failed to bind to address {}: {}", bind_address, e))?;

    let server_url = config.server_url();
    info!("Server running on {}", server_url);
    info!("OpenAPI docs available at {}/openapi.json", server_url);

    // Print available environment variables for configuration
    info!("Configuration options:");
    info!("  VIDGRAB_HOST: Host to bind to (default: 0.0.0.0)");
    info!("  PORT or VIDGRAB_PORT: Port to bind to (default: 5000)");
    info!("  RUST_LOG or VIDGRAB_LOG_LEVEL: Log level (default: vidgrab_web_api=debug,vidgrab_core=debug,tower_http=debug)");
    info!("  VIDGRAB_LOG_FORMAT: Log format - 'json' or 'text' (default: json)");
    info!("  VIDGRAB_CORS_ORIGINS: Comma-separated CORS origins (default: *)");
    info!("  VIDGRAB_STORAGE_DIR or RAILWAY_VOLUME_MOUNT_PATH: Storage directory (default: /data)");
    info!("  VIDGRAB_MAX_DURATION_SECONDS: Maximum video duration (default: 3600)");
    info!("  VIDGRAB_MAX_FILE_AGE_HOURS: Hours to keep downloaded files (default: 24)");
    info!("  VIDGRAB_SWEEP_INTERVAL_SECONDS: Retention sweep interval (default: 3600)");
    info!("  VIDGRAB_RATE_LIMIT_REQUESTS: Requests per client per window (default: 10)");
    info!("  VIDGRAB_RATE_LIMIT_WINDOW_MINUTES: Rate limit window in minutes (default: 60)");
    info!("  VIDGRAB_RATE_LIMIT_COMPACTION_SECONDS: Idle client cleanup interval (default: 600)");
    info!("  VIDGRAB_YTDLP_PATH: yt-dlp executable (default: yt-dlp)");
    info!("  VIDGRAB_FETCH_TIMEOUT_SECONDS: Deadline per yt-dlp call (default: none)");

    let mut sweeper = RetentionSweeper::new(
        config.storage_dir.clone(),
        config.max_file_age,
        config.sweep_interval,
    );
    sweeper.start();

    let mut cleanup_service = CleanupService::new(
        Arc::clone(&rate_limiter),
        config.rate_limit_compaction_interval,
    );
    cleanup_service.start();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down vidgrab-web-api server");
    sweeper.stop();
    cleanup_service.stop();

    Ok(())
}
