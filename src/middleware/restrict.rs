use axum::{extract::Request, middleware::Next, response::Response};

use super::auth::CurrentUser;
use crate::database::models::Role;
use crate::error::ApiError;

/// Lets the request through only when the current user holds one of
/// `roles`. Must run after `protect`.
pub async fn restrict_to(roles: &'static [Role], request: Request, next: Next) -> Result<Response, ApiError> {
    let CurrentUser(user) = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized("You are not logged in! Please log in to get access."))?;

    if !user.has_role(roles) {
        return Err(ApiError::forbidden("You do not have permission to perform this action"));
    }
    Ok(next.run(request).await)
}
