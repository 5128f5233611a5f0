// handlers/protected/analytics.rs - GET /analytics

use std::sync::Arc;

use axum::{extract::State, Extension};

use crate::middleware::{ApiQuery, ApiResponse, ApiResult};
use crate::resources::analytics::{AnalyticsQuery, AnalyticsService, AnalyticsSummary};
use crate::types::Actor;

pub async fn summary(
    State(service): State<Arc<AnalyticsService>>,
    Extension(actor): Extension<Actor>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> ApiResult<AnalyticsSummary> {
    let summary = service.summary(actor, query).await?;
    Ok(ApiResponse::success(summary))
}
