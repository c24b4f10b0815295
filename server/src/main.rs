//! `dr-server`: HTTP/WebSocket binary wiring the research engine's
//! components (C1-C10) behind the external chat interface (§4.11).

mod config;
mod error;
mod llm;
mod routes;
mod scraper;
mod search_backend;
mod session_runner;
mod state;

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use config::{AppConfig, Cli};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::from_env();
    let app_state = AppState::build(config, cli.memory_root)?;

    tokio::spawn(expire_stale_sessions(app_state.clone()));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .merge(routes::router())
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(cli.bind.as_str()).await?;
    tracing::info!(bind = %cli.bind, "dr-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

/// §4.7 periodic sweep: every 5 minutes, transitions sessions untouched
/// for over an hour to `expired`.
async fn expire_stale_sessions(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(5 * 60));
    loop {
        interval.tick().await;
        match state.sessions.cleanup_expired_sessions(Duration::from_secs(60 * 60)).await {
            Ok(count) if count > 0 => tracing::info!(count, "expired stale sessions"),
            Ok(_) => {}
            Err(error) => tracing::warn!(%error, "failed to sweep stale sessions"),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received, draining in-flight sessions");
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dr_server={default_level},dr_graph={default_level},dr_agent={default_level}")));

    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}
