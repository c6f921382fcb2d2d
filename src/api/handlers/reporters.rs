//! Reporter registry endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::address::normalize_address;
use crate::api::middleware::error::ApiError;
use crate::api::models::{ReporterView, ReportersResponse, UpdateReporterRequest};
use crate::app_state::AppState;
use crate::registry::ReporterEntry;

#[utoipa::path(
    get,
    path = "/api/v1/reporters",
    responses(
        (status = 200, description = "Registry snapshot", body = ReportersResponse),
        (status = 503, description = "Registry not running")
    ),
    tag = "Reporters"
)]
/// Returns every known reporter keyed by address, with stake cooldowns
/// evaluated at the current time.
#[instrument(skip(state))]
pub async fn list_reporters(
    State(state): State<AppState>,
) -> Result<Json<ReportersResponse>, ApiError> {
    let now = Utc::now().timestamp();
    let reporters = state
        .registry
        .snapshot()
        .await?
        .into_iter()
        .map(|(address, entry)| (address, ReporterView::at(entry, now)))
        .collect::<std::collections::BTreeMap<_, _>>();

    Ok(Json(ReportersResponse {
        count: reporters.len(),
        now,
        reporters,
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/reporters/{address}",
    params(
        ("address" = String, Path, description = "Reporter address (0x hex)")
    ),
    request_body = UpdateReporterRequest,
    responses(
        (status = 200, description = "Updated entry", body = ReporterEntry),
        (status = 400, description = "Invalid address or empty update")
    ),
    tag = "Reporters"
)]
/// Sets the working flag and/or label of a reporter.
#[instrument(skip(state, update))]
pub async fn update_reporter(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(update): Json<UpdateReporterRequest>,
) -> Result<Json<ReporterEntry>, ApiError> {
    let address = normalize_address(&address)?;

    let mut entry = None;
    if let Some(working) = update.is_working {
        entry = Some(state.registry.set_working(&address, working).await?);
    }
    if let Some(label) = update.label {
        entry = Some(state.registry.set_label(&address, Some(label)).await?);
    }

    let entry = entry.ok_or_else(|| {
        ApiError::BadRequest("Provide is_working and/or label".to_string())
    })?;

    info!(
        address = %entry.address,
        is_working = entry.is_working,
        label = ?entry.label,
        "Reporter updated"
    );

    Ok(Json(entry))
}
