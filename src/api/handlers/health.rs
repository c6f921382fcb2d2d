//! Health check endpoint.

use axum::{extract::State, Json};
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use tracing::instrument;

use crate::api::models::{HealthResponse, HealthStatus};
use crate::app_state::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "Health"
)]
/// Returns service health information.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = SystemTime::now()
        .duration_since(state.start_time)
        .unwrap_or_default()
        .as_secs();

    let (db, snapshot, head) = tokio::join!(
        state.repository.health_check(),
        state.registry.snapshot(),
        state.oracle.chain_head_block(),
    );

    let database_status = status_of(db.is_ok());
    let registry_status = status_of(snapshot.is_ok());
    let rpc_status = if head.is_ok() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    let status = match (database_status, registry_status, rpc_status) {
        (HealthStatus::Healthy, HealthStatus::Healthy, HealthStatus::Healthy) => {
            HealthStatus::Healthy
        }
        (HealthStatus::Healthy, HealthStatus::Healthy, _) => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        database_status,
        registry_status,
        rpc_status,
        head_block: head.ok(),
        reporters: snapshot.map(|s| s.len()).unwrap_or_default(),
        stream_clients: state.stream_clients.load(Ordering::Relaxed),
    })
}

const fn status_of(ok: bool) -> HealthStatus {
    if ok {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    }
}
