use crate::config::Config;
use crate::delivery::ClientProfile;
use crate::library::{Library, SubtitleExtractor, Thumbnailer};
use crate::probe::Prober;
use crate::process::ProcessPool;
use crate::streaming::LiveSessionManager;
use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    extract::State,
    routing::get,
    Json, Router,
};
use lanplay_av::ToolPaths;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub mod error;
pub mod routes_library;
pub mod routes_video;

/// How long shutdown waits for killed processes to be reaped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub library: Arc<Library>,
    pub profile: Arc<ClientProfile>,
    pub prober: Arc<Prober>,
    /// Owns every external process the service spawns.
    pub pool: ProcessPool,
    /// The single live transmux/transcode slot.
    pub live: LiveSessionManager,
    pub thumbnails: Thumbnailer,
    pub subtitles: SubtitleExtractor,
    pub tools: ToolPaths,
}

impl AppContext {
    pub fn new(config: Config, tools: ToolPaths) -> Self {
        let pool = ProcessPool::new(config.delivery.idle_grace());
        let live = LiveSessionManager::new(
            pool.clone(),
            tools.ffmpeg.clone(),
            config.transcode.settings(),
        );
        let thumbnails = Thumbnailer::new(
            pool.clone(),
            tools.ffmpeg.clone(),
            config.library.thumbnail_dir.clone(),
            config.library.thumbnail_offset_secs,
            config.library.thumbnail_width,
        );

        Self {
            library: Arc::new(Library::new(
                config.library.root.clone(),
                &config.library.extensions,
            )),
            profile: Arc::new(config.delivery.client_profile()),
            prober: Arc::new(Prober::new(
                tools.ffprobe.clone(),
                config.delivery.probe_cache,
            )),
            subtitles: SubtitleExtractor::new(tools.ffmpeg.clone()),
            config: Arc::new(config),
            pool,
            live,
            thumbnails,
            tools,
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::RANGE, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES]);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .merge(routes_video::video_routes())
        .merge(routes_library::library_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // SPA fallback: serves index.html for any route that doesn't match a file
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        }
    }

    app
}

async fn health_check(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pooled_processes": ctx.pool.len(),
        "live_session": ctx.live.active(),
    }))
}

/// Start the HTTP server and run until a shutdown signal arrives.
///
/// Every external process is killed before this returns.
pub async fn start_server(config: Config, tools: ToolPaths) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    tokio::fs::create_dir_all(&config.library.thumbnail_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create thumbnail directory: {:?}",
                config.library.thumbnail_dir
            )
        })?;

    let static_dir = config.server.static_dir.clone();
    let ctx = AppContext::new(config, tools);
    let pool = ctx.pool.clone();
    let app = create_router(ctx, static_dir);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(pool.clone()))
        .await;

    pool.shutdown(SHUTDOWN_GRACE).await;
    served?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// Processes are killed as soon as the signal arrives so open live
/// streams end and the graceful shutdown can complete.
async fn shutdown_signal(pool: ProcessPool) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    pool.terminate_all();
}
