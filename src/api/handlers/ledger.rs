//! Ledger and earnings endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::{debug, instrument};

use crate::address::normalize_address;
use crate::api::middleware::error::ApiError;
use crate::api::models::{LedgerQuery, LedgerResponse, RecentEarningsResponse, RecentQuery};
use crate::app_state::AppState;
use crate::oracle::spot_prices;
use crate::query::{summary, DEFAULT_RECENT_LIMIT};

#[utoipa::path(
    get,
    path = "/api/v1/ledger/{address}",
    params(
        ("address" = String, Path, description = "Wallet address (0x hex)"),
        LedgerQuery
    ),
    responses(
        (status = 200, description = "Stored records with totals", body = LedgerResponse),
        (status = 400, description = "Invalid address")
    ),
    tag = "Ledger"
)]
/// Returns the stored ledger of an address, newest block first.
#[instrument(skip(state))]
pub async fn get_ledger(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let address = normalize_address(&address)?;

    let (records, prices) = tokio::join!(
        state.query.ledger(&address, query.hide_failed),
        spot_prices(state.oracle.as_ref()),
    );
    let records = records?;
    let summary = summary(&records, prices);

    debug!(records = records.len(), "Ledger served");

    Ok(Json(LedgerResponse {
        address,
        records,
        summary,
        prices,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/earnings/recent",
    params(RecentQuery),
    responses(
        (status = 200, description = "Most recent rewarded records", body = RecentEarningsResponse)
    ),
    tag = "Ledger"
)]
/// Returns the most recent rewarded records across all reporters.
#[instrument(skip(state))]
pub async fn recent_earnings(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentEarningsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if limit == 0 {
        return Err(ApiError::BadRequest("limit must be >= 1".to_string()));
    }

    let (records, prices) = tokio::join!(
        state.query.recent_earnings(limit),
        spot_prices(state.oracle.as_ref()),
    );
    let records = records?;

    Ok(Json(RecentEarningsResponse {
        summary: summary(&records, prices),
        records,
        prices,
    }))
}
