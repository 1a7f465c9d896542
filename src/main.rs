use std::sync::Arc;

use lagmon::config::Config;
use lagmon::status::start_status_server;
use lagmon::worker::Worker;
use lagmon::LagmonEngine;
use tracing_subscriber::EnvFilter;

// ========================================
// MAIN ENTRY POINT
// ========================================

#[tokio::main]
async fn main() {
    let config = match Config::global() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[Server] {}", e);
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("🚀 Lagmon v{} Starting...", env!("CARGO_PKG_VERSION"));

    let engine = match LagmonEngine::bootstrap(config).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("[Server] Failed to initialize lag emitter: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("📦 Emitter initialized with {} pairs", engine.emitter.pairs().len());

    let board = Arc::clone(&engine.status);
    let host = config.server.host.clone();
    let port = config.server.status_port;
    tokio::spawn(async move {
        if let Err(e) = start_status_server(board, &host, port).await {
            tracing::error!("[Server] Status server stopped: {}", e);
        }
    });

    let worker = Worker::new(Arc::clone(&engine.emitter), config.emitter.interval());
    let cycles = worker
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    tracing::info!(
        "[Server] Shut down after {} cycles ({:?} uptime)",
        cycles,
        engine.start_time.elapsed()
    );
}
