//! OpenAPI documentation for the REST API.

use utoipa::OpenApi;

use crate::api::handlers;

/// OpenAPI documentation for the REST API.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::sync::sync_address,
        handlers::ledger::get_ledger,
        handlers::ledger::recent_earnings,
        handlers::reporters::list_reporters,
        handlers::reporters::update_reporter,
        handlers::market::get_market,
        handlers::stream::websocket_handler,
    ),
    components(schemas(
        crate::api::models::HealthResponse,
        crate::api::models::HealthStatus,
        crate::api::models::ErrorResponse,
        crate::api::models::LedgerResponse,
        crate::api::models::RecentEarningsResponse,
        crate::api::models::ReportersResponse,
        crate::api::models::ReporterView,
        crate::api::models::UpdateReporterRequest,
        crate::api::models::StreamHello,
        crate::db::models::LedgerRecord,
        crate::db::models::TxStatus,
        crate::events::ReportEvent,
        crate::oracle::MarketSnapshot,
        crate::oracle::SpotPrices,
        crate::query::LedgerSummary,
        crate::registry::RecentReward,
        crate::registry::ReporterEntry,
        crate::stakers::Staker,
        crate::sync::SyncReport,
    )),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Sync", description = "Incremental ledger sync"),
        (name = "Ledger", description = "Stored ledgers and earnings"),
        (name = "Reporters", description = "Reporter registry"),
        (name = "Market", description = "Spot prices and chain head"),
        (name = "Streaming", description = "WebSocket streaming"),
    ),
    info(
        title = "Oracle Ledger Sync API",
        version = "1.0.0",
        description = "Incremental wallet ledgers and reward reconciliation for oracle reporters",
    )
)]
pub struct ApiDoc;
