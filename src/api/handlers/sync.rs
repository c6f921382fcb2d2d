//! Sync trigger endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use crate::api::middleware::error::ApiError;
use crate::app_state::AppState;
use crate::sync::SyncReport;

#[utoipa::path(
    post,
    path = "/api/v1/sync/{address}",
    params(
        ("address" = String, Path, description = "Wallet address (0x hex)")
    ),
    responses(
        (status = 200, description = "Pass finished", body = SyncReport),
        (status = 400, description = "Invalid address"),
        (status = 502, description = "Indexer or node failed, cursor unchanged")
    ),
    tag = "Sync"
)]
/// Runs one incremental sync pass for an address.
///
/// Waits if a pass for the same address is already running.
#[instrument(skip(state))]
pub async fn sync_address(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<SyncReport>, ApiError> {
    let report = state.engine.sync_address(&address).await?;

    info!(
        address = %report.address,
        transactions = report.transactions,
        cursor = ?report.cursor_after,
        "Sync requested via API"
    );

    Ok(Json(report))
}
