// handlers/protected/resource.rs - Generic CRUD routes over a CrudService
//
//   GET    /{r}          list (page, page_size, order, search, filter)
//   POST   /{r}          create → 201
//   POST   /{r}/find     list with a JSON body
//   GET    /{r}/:id      show
//   PATCH  /{r}/:id      partial update (PUT behaves the same)
//   DELETE /{r}/:id      delete, returns the removed record

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Router,
};

use crate::middleware::{ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult};
use crate::resources::CrudService;
use crate::rules::{ListQuery, ListRequest, Page};
use crate::types::Actor;

/// Routes for one resource mounted at `path` (e.g. `/users`)
pub fn routes<S: CrudService>(path: &str, service: Arc<S>) -> Router {
    Router::new()
        .route(path, get(list::<S>).post(create::<S>))
        .route(&format!("{}/find", path), post(find::<S>))
        .route(
            &format!("{}/:id", path),
            get(show::<S>)
                .patch(update::<S>)
                .put(update::<S>)
                .delete(delete::<S>),
        )
        .with_state(service)
}

async fn list<S: CrudService>(
    State(service): State<Arc<S>>,
    Extension(actor): Extension<Actor>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Page<S::Record>> {
    let page = service.list(actor, query.into_request()).await?;
    Ok(ApiResponse::success(page))
}

async fn find<S: CrudService>(
    State(service): State<Arc<S>>,
    Extension(actor): Extension<Actor>,
    ApiJson(request): ApiJson<ListRequest>,
) -> ApiResult<Page<S::Record>> {
    let page = service.list(actor, request).await?;
    Ok(ApiResponse::success(page))
}

async fn show<S: CrudService>(
    State(service): State<Arc<S>>,
    Extension(actor): Extension<Actor>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<S::Record> {
    let record = service.get(actor, id).await?;
    Ok(ApiResponse::success(record))
}

async fn create<S: CrudService>(
    State(service): State<Arc<S>>,
    Extension(actor): Extension<Actor>,
    ApiJson(input): ApiJson<S::Create>,
) -> ApiResult<S::Record> {
    let record = service.create(actor, input).await?;
    Ok(ApiResponse::created(record))
}

async fn update<S: CrudService>(
    State(service): State<Arc<S>>,
    Extension(actor): Extension<Actor>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<S::Update>,
) -> ApiResult<S::Record> {
    let record = service.update(actor, id, input).await?;
    Ok(ApiResponse::success(record))
}

async fn delete<S: CrudService>(
    State(service): State<Arc<S>>,
    Extension(actor): Extension<Actor>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<S::Record> {
    let record = service.delete(actor, id).await?;
    Ok(ApiResponse::success(record))
}
