//! Generic CRUD handlers shared by every [`Model`].
//!
//! Each resource mounts `create::<M>`, `get_one::<M>`, `get_many::<M>`,
//! `update::<M>` and `delete::<M>`; resource modules reuse the plain
//! functions below when they need to add to a response.

use axum::extract::{Path, RawQuery, State};
use serde_json::Value;
use sqlx::PgPool;
use validator::Validate;

use crate::api::QueryFeatures;
use crate::database::models::{parse_id, Model};
use crate::database::repository::Repository;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult};
use crate::AppState;

pub async fn create_one<M: Model>(pool: &PgPool, data: M::Create) -> Result<M, ApiError> {
    data.validate()?;
    let doc = M::insert(pool, data).await?;
    doc.after_write(pool).await?;
    tracing::debug!("Created {} {}", M::NAME, doc.id());
    Ok(doc)
}

/// One record as JSON with its references populated
pub async fn find_doc<M: Model>(pool: &PgPool, id: &str) -> Result<Value, ApiError> {
    let id = parse_id(id)?;
    let doc = Repository::<M>::new(pool.clone()).select_404(id).await?;
    let mut docs = [serde_json::to_value(&doc).map_err(ApiError::internal)?];
    M::populate(pool, &mut docs).await?;
    let [doc] = docs;
    Ok(doc)
}

/// Runs the query-feature chain and returns one page plus the match count.
/// `extra_scope` is ANDed in like the model scope.
pub async fn list<M: Model>(pool: &PgPool, query: Option<&str>, extra_scope: Option<Value>) -> ApiResult<Vec<Value>> {
    let features = QueryFeatures::new(query, M::SCHEMA)
        .filter()?
        .sort()?
        .limit_fields()?
        .paginate()?;

    let repo = Repository::<M>::new(pool.clone());
    let mut filter = repo.filter()?;
    filter.assign(features.into_filter_data())?;
    if let Some(scope) = extra_scope {
        filter.where_clause(scope)?;
    }

    let total = repo.count(filter.clone()).await?;
    let mut docs = repo.select_docs(filter).await?;
    M::populate(pool, &mut docs).await?;

    let results = docs.len();
    Ok(ApiResponse::success(docs).with_results(results).with_total(total))
}

/// Merges `patch` onto the stored record, validates the merged record as a
/// whole and writes it.
pub async fn update_one<M: Model>(pool: &PgPool, id: &str, patch: Value) -> Result<M, ApiError> {
    let id = parse_id(id)?;
    let current = Repository::<M>::new(pool.clone()).select_404(id).await?;

    let Value::Object(patch) = patch else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };
    let mut merged = serde_json::to_value(current.to_update()).map_err(ApiError::internal)?;
    if let Value::Object(target) = &mut merged {
        target.extend(patch);
    }
    let data: M::Update = serde_json::from_value(merged).map_err(|e| ApiError::invalid_json(e.to_string()))?;
    data.validate()?;

    let doc = M::update(pool, id, data).await?;
    doc.after_write(pool).await?;
    Ok(doc)
}

pub async fn delete_one<M: Model>(pool: &PgPool, id: &str) -> Result<(), ApiError> {
    let id = parse_id(id)?;
    Repository::<M>::new(pool.clone()).select_404(id).await?;
    let doc = M::delete(pool, id).await?;
    doc.after_write(pool).await?;
    tracing::debug!("Deleted {} {}", M::NAME, id);
    Ok(())
}

/// POST - create a record
pub async fn create<M: Model>(State(state): State<AppState>, ApiJson(data): ApiJson<M::Create>) -> ApiResult<M> {
    Ok(ApiResponse::created(create_one::<M>(&state.pool, data).await?))
}

/// GET /:id - one record
pub async fn get_one<M: Model>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    Ok(ApiResponse::success(find_doc::<M>(&state.pool, &id).await?))
}

/// GET - filtered, sorted, projected page of records
pub async fn get_many<M: Model>(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Vec<Value>> {
    list::<M>(&state.pool, query.as_deref(), None).await
}

/// PATCH /:id - partial update
pub async fn update<M: Model>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<Value>,
) -> ApiResult<M> {
    Ok(ApiResponse::success(update_one::<M>(&state.pool, &id, patch).await?))
}

/// DELETE /:id - 204 on success
pub async fn delete<M: Model>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    delete_one::<M>(&state.pool, &id).await?;
    Ok(ApiResponse::no_content())
}
