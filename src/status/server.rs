use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::compression::CompressionLayer;

use crate::status::snapshot::StatusBoard;

pub fn router(board: Arc<StatusBoard>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/lag", get(get_lag))
        .layer(CompressionLayer::new())
        .with_state(board)
}

pub async fn start_status_server(board: Arc<StatusBoard>, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("[Status] Lag status available at http://{}/api/lag", addr);
    axum::serve(listener, router(board)).await
}

async fn health() -> &'static str {
    "ok"
}

async fn get_lag(State(board): State<Arc<StatusBoard>>) -> impl IntoResponse {
    axum::Json(board.snapshot())
}
