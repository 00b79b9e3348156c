use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::auth::verify_token;
use crate::database::models::User;
use crate::database::repository::Repository;
use crate::error::ApiError;
use crate::AppState;

pub const JWT_COOKIE: &str = "jwt";

/// The authenticated user, attached to the request by [`protect`]
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(not_logged_in)
    }
}

fn not_logged_in() -> ApiError {
    ApiError::unauthorized("You are not logged in! Please log in to get access.")
}

/// Requires a valid session token from the `Authorization: Bearer` header or
/// the `jwt` cookie, for a user that still exists, is active and has not
/// changed password since the token was issued.
pub async fn protect(State(state): State<AppState>, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or_else(not_logged_in)?;
    let claims = verify_token(&token)?;

    let user = Repository::<User>::new(state.pool.clone())
        .select_one(json!({ "id": claims.sub }))
        .await?
        .ok_or_else(|| ApiError::unauthorized("The user belonging to this token no longer exists."))?;

    if claims.issued_before(user.password_changed_at) {
        return Err(ApiError::unauthorized("User recently changed password! Please log in again."));
    }

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Bearer token first, then the session cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == JWT_COOKIE && !value.is_empty() && *value != "loggedout")
        .map(|(_, value)| value.to_string())
}
