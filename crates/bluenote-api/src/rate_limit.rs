use std::num::NonZeroU32;

use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::warn;

use bluenote_types::api::Claims;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// File deletions allowed per user per minute.
pub const FILE_DELETES_PER_MINUTE: u32 = 10;

/// Token-bucket limiter keyed by user id.
pub type UserRateLimiter = DefaultKeyedRateLimiter<i64>;

/// A limiter allowing `requests` per minute per user, all of them usable
/// in a single burst.
pub fn per_minute(requests: u32) -> UserRateLimiter {
    let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
    RateLimiter::keyed(quota)
}

/// Must be layered inside `require_auth`.
pub async fn limit_file_deletes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    req: Request,
    next: Next,
) -> ApiResult<Response> {
    if state.file_delete_limiter.check_key(&claims.sub).is_err() {
        warn!("User {} exceeded the file delete rate limit", claims.sub);
        return Err(ApiError::TooManyRequests);
    }
    Ok(next.run(req).await)
}
