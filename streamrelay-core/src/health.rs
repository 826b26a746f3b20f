// File: streamrelay-core/src/health.rs
//
// Optional liveness endpoint for hosts that expect the process to listen on a port.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use streamrelay_common::models::ConnectionState;

use crate::Error;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub connection: ConnectionState,
}

pub fn router(state: watch::Receiver<ConnectionState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<watch::Receiver<ConnectionState>>) -> Json<HealthReport> {
    let connection = *state.borrow();
    Json(HealthReport { status: "ok", connection })
}

pub async fn serve(listener: TcpListener, state: watch::Receiver<ConnectionState>) -> Result<(), Error> {
    let addr = listener.local_addr()?;
    info!("[Health] listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
