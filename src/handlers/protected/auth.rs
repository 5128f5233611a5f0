// handlers/protected/auth.rs - GET /auth/me

use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult};
use crate::types::Actor;

/// GET /auth/me - The actor decoded from the bearer token
pub async fn me(Extension(actor): Extension<Actor>) -> ApiResult<Actor> {
    Ok(ApiResponse::success(actor))
}
