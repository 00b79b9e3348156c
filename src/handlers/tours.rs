use axum::extract::{Path, RawQuery, State};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::geo::{parse_distance, LatLng, Unit};
use crate::database::models::{parse_id, Review, ReviewCreate, Tour};
use crate::database::repository::Repository;
use crate::error::ApiError;
use crate::handlers::factory::{create_one, find_doc, list};
use crate::middleware::{ApiJson, ApiResponse, ApiResult, CurrentUser};
use crate::services::tour_service::{DifficultyStats, MonthlyStarts, TourDistance};
use crate::services::TourService;
use crate::AppState;

const TOP_FIVE_CHEAP: &str = "limit=5&sort=-ratings_average,price&fields=name,price,ratings_average,summary,difficulty";

/// GET /tours/top-5-cheap
pub async fn top_five_cheap(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Vec<Value>> {
    let query = match query.filter(|q| !q.is_empty()) {
        Some(q) => format!("{}&{}", q, TOP_FIVE_CHEAP),
        None => TOP_FIVE_CHEAP.to_string(),
    };
    list::<Tour>(&state.pool, Some(&query), None).await
}

/// GET /tours/:id with guides and reviews embedded
pub async fn get_tour(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let mut doc = find_doc::<Tour>(&state.pool, &id).await?;
    let tour_id = parse_id(&id)?;
    doc["reviews"] = json!(Review::for_tour(&state.pool, tour_id).await?);
    Ok(ApiResponse::success(doc))
}

pub async fn tour_stats(State(state): State<AppState>) -> ApiResult<Vec<DifficultyStats>> {
    let stats = TourService::new(state.pool).stats().await?;
    Ok(ApiResponse::success(stats))
}

pub async fn monthly_plan(State(state): State<AppState>, Path(year): Path<String>) -> ApiResult<Vec<MonthlyStarts>> {
    let year = year
        .parse::<i32>()
        .ok()
        .filter(|y| (1970..=9999).contains(y))
        .ok_or_else(|| ApiError::bad_request(format!("Invalid year: {}", year)))?;

    let plan = TourService::new(state.pool).monthly_plan(year).await?;
    let results = plan.len();
    Ok(ApiResponse::success(plan).with_results(results))
}

/// GET /tours/tours-within/:distance/center/:latlng/unit/:unit
pub async fn tours_within(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> ApiResult<Vec<Tour>> {
    let distance = parse_distance(&distance)?;
    let center: LatLng = latlng.parse()?;
    let unit: Unit = unit.parse()?;

    let tours = TourService::new(state.pool).within(distance, center, unit).await?;
    let results = tours.len();
    Ok(ApiResponse::success(tours).with_results(results))
}

/// GET /tours/distances/:latlng/unit/:unit
pub async fn distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> ApiResult<Vec<TourDistance>> {
    let origin: LatLng = latlng.parse()?;
    let unit: Unit = unit.parse()?;

    let distances = TourService::new(state.pool).distances(origin, unit).await?;
    let results = distances.len();
    Ok(ApiResponse::success(distances).with_results(results))
}

async fn existing_tour(state: &AppState, id: &str) -> Result<Uuid, ApiError> {
    let id = parse_id(id)?;
    Repository::<Tour>::new(state.pool.clone()).select_404(id).await?;
    Ok(id)
}

/// GET /tours/:id/reviews
pub async fn get_tour_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Vec<Value>> {
    let tour_id = existing_tour(&state, &id).await?;
    list::<Review>(&state.pool, query.as_deref(), Some(json!({ "tour_id": tour_id }))).await
}

/// POST /tours/:id/reviews: the tour comes from the path, the author is
/// always the caller.
pub async fn create_tour_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(mut data): ApiJson<ReviewCreate>,
) -> ApiResult<Review> {
    data.tour_id = Some(existing_tour(&state, &id).await?);
    data.user_id = Some(user.id);
    Ok(ApiResponse::created(create_one::<Review>(&state.pool, data).await?))
}
