// handlers/public/mod.rs - Public handlers (no authentication required)

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::Store;
use crate::middleware::ApiResponse;

/// GET / - Service information
pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "Admin API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "CRUD admin backend with rule pipelines",
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "auth": "/auth/me (protected)",
            "resources": "/users, /posts, /categories, /pokemon, /profiles, /large-table[/:id] (protected)",
            "find": "POST /{resource}/find (protected)",
            "analytics": "/analytics?from=&to= (protected)",
        }
    }))
}

/// GET /health - Store connectivity check
pub async fn health(State(store): State<Arc<dyn Store>>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match store.health_check().await {
        Ok(()) => ApiResponse::success(json!({
            "status": "ok",
            "timestamp": now,
            "database": "ok"
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": {
                        "code": "SERVICE_UNAVAILABLE",
                        "message": "database unavailable"
                    },
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
                .into_response()
        }
    }
}
