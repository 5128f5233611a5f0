pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod resources;
pub mod rules;
pub mod types;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{HeaderValue, Uri},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::database::Store;
use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::resources::{AnalyticsService, Services};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub services: Services,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let services = Services::new(store.clone());
        Self { store, services }
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<AnalyticsService> {
    fn from_ref(state: &AppState) -> Self {
        state.services.analytics.clone()
    }
}

/// The full HTTP application over `store`
pub fn app(store: Arc<dyn Store>) -> Router {
    let config = config::config();
    let state = AppState::new(store);
    let services = state.services.clone();

    let protected = Router::new()
        .route("/auth/me", get(protected::auth::me))
        .route("/analytics", get(protected::analytics::summary))
        .with_state(state.clone())
        .merge(protected::resource::routes("/users", services.users))
        .merge(protected::resource::routes("/posts", services.posts))
        .merge(protected::resource::routes("/categories", services.categories))
        .merge(protected::resource::routes("/pokemon", services.pokemon))
        .merge(protected::resource::routes("/profiles", services.profiles))
        .merge(protected::resource::routes("/large-table", services.large_table))
        .route_layer(from_fn(middleware::auth_middleware));

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .with_state(state)
        // Protected
        .merge(protected)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.security))
                .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes)),
        )
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}
