//! Axum server setup and routing.

use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{docs::ApiDoc, handlers, middleware as api_middleware};
use crate::app_state::AppState;
use crate::error::{LedgerError, LedgerResult};

/// Full application router: `/api/v1` routes, Swagger UI and middleware.
pub fn router(state: AppState, rate_limit_rpm: u32, cors_origins: &[String]) -> Router {
    let limiter = api_middleware::rate_limit::create_rate_limiter(rate_limit_rpm);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/sync/:address", post(handlers::sync::sync_address))
        .route("/ledger/:address", get(handlers::ledger::get_ledger))
        .route("/earnings/recent", get(handlers::ledger::recent_earnings))
        .route("/reporters", get(handlers::reporters::list_reporters))
        .route("/reporters/:address", put(handlers::reporters::update_reporter))
        .route("/market", get(handlers::market::get_market))
        .route("/stream", get(handlers::stream::websocket_handler));

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(cors_origins))
        .layer(middleware::from_fn(api_middleware::logging::log_requests))
        .layer(middleware::from_fn(move |req, next| {
            api_middleware::rate_limit::rate_limit(limiter.clone(), req, next)
        }));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes)
        .layer(middleware_stack)
        .with_state(state)
}

/// Run the Axum API server until the process stops.
///
/// # Errors
///
/// Returns a configuration error if the port cannot be bound.
pub async fn run_server(
    state: AppState,
    port: u16,
    rate_limit_rpm: u32,
    cors_origins: &[String],
) -> LedgerResult<()> {
    let app = router(state, rate_limit_rpm, cors_origins);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        LedgerError::config(format!("Failed to bind {addr}"), Some(Box::new(e)))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| LedgerError::config("API server stopped", Some(Box::new(e))))
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(header) => Some(header),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new().allow_origin(allowed)
}
