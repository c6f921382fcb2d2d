//! Rate limiting middleware.

use axum::{extract::Request, middleware::Next, response::Response};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;

/// Shared rate limiter type.
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const FALLBACK_RPM: NonZeroU32 = match NonZeroU32::new(60) {
    Some(rpm) => rpm,
    None => NonZeroU32::MIN,
};

/// Create a rate limiter with the specified RPM quota; 0 falls back to 60.
#[must_use]
pub fn create_rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_RPM));
    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware.
///
/// # Errors
///
/// Returns [`ApiError::RateLimitExceeded`] once the quota is spent.
pub async fn rate_limit(
    limiter: SharedRateLimiter,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if limiter.check().is_err() {
        debug!(uri = %request.uri(), "Request rate limited");
        return Err(ApiError::RateLimitExceeded);
    }
    Ok(next.run(request).await)
}
