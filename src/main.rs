//! VAR Refserver
//!
//! Main entry point for the officiating assistant server.

use refserver::{
    analyzer_client::AnalyzerClient,
    dvr::ClipWriter,
    pipeline::FramePipeline,
    realtime_hub::RealtimeHub,
    review::ReviewDispatcher,
    session::StreamSession,
    state::{AppConfig, AppState},
    task_registry::TaskRegistry,
    verdict_client::VerdictClient,
    web_api,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refserver=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting VAR Refserver v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        analyzer_url = %config.analyzer_url,
        verdict_url = %config.verdict_url,
        scratch_dir = %config.scratch_dir.display(),
        dvr_capacity = config.dvr_capacity,
        "Configuration loaded"
    );

    // Initialize components
    let session = Arc::new(StreamSession::new(config.dvr_capacity));
    let analyzer = Arc::new(AnalyzerClient::new(config.analyzer_url.clone()));
    let verdict = Arc::new(VerdictClient::new(config.verdict_url.clone()));
    let realtime = Arc::new(RealtimeHub::new());
    let tasks = Arc::new(TaskRegistry::new());

    let clips = Arc::new(ClipWriter::new(config.scratch_dir.clone()).await?);
    tracing::info!(scratch_dir = %config.scratch_dir.display(), "ClipWriter initialized");

    let pipeline = Arc::new(
        FramePipeline::new(session.clone(), analyzer.clone()).with_annotation(config.annotate),
    );

    let review = Arc::new(ReviewDispatcher::new(
        session.clone(),
        clips.clone(),
        verdict.clone(),
        realtime.clone(),
        tasks.clone(),
    ));
    tracing::info!("ReviewDispatcher initialized");

    let state = AppState {
        config,
        session,
        pipeline,
        review,
        realtime,
        analyzer,
        verdict,
        tasks: tasks.clone(),
    };

    // Periodic scratch purge, cancellable on shutdown
    {
        let clips = clips.clone();
        let interval_secs = state.config.purge_interval_secs;
        let cancel = tasks.cancel_token();
        tasks
            .spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
                interval.tick().await; // first tick fires immediately
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = interval.tick() => {
                            if let Err(e) = clips.purge_scratch().await {
                                tracing::error!(error = %e, "Scratch purge failed");
                            }
                        }
                    }
                }
            })
            .await;
    }
    tracing::info!("Scratch purge loop started");

    // Create router
    let app = web_api::create_router(state.clone())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Cancel the purge loop, give in-flight review jobs a grace join
    tasks.shutdown(Duration::from_secs(5)).await;
    tracing::info!("Shutdown complete");

    Ok(())
}
