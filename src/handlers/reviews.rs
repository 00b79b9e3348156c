use axum::extract::State;

use crate::database::models::{Review, ReviewCreate, Tour};
use crate::database::repository::Repository;
use crate::handlers::factory::create_one;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, CurrentUser};
use crate::AppState;

/// POST /reviews: `tour_id` comes from the body, the author is the caller
pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(mut data): ApiJson<ReviewCreate>,
) -> ApiResult<Review> {
    // Secret tours are out of scope and do not accept reviews
    if let Some(tour_id) = data.tour_id {
        Repository::<Tour>::new(state.pool.clone()).select_404(tour_id).await?;
    }
    data.user_id = Some(user.id);
    Ok(ApiResponse::created(create_one::<Review>(&state.pool, data).await?))
}
