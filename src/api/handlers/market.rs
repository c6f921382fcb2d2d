//! Market data endpoint.

use axum::{extract::State, Json};
use tracing::instrument;

use crate::app_state::AppState;
use crate::oracle::{market_snapshot, MarketSnapshot};

#[utoipa::path(
    get,
    path = "/api/v1/market",
    responses(
        (status = 200, description = "Spot prices, gas price and chain head", body = MarketSnapshot)
    ),
    tag = "Market"
)]
/// Returns ETH and TRB spot prices, the gas price and the chain head.
///
/// Unavailable fields read as 0 or null.
#[instrument(skip(state))]
pub async fn get_market(State(state): State<AppState>) -> Json<MarketSnapshot> {
    Json(market_snapshot(state.oracle.as_ref()).await)
}
