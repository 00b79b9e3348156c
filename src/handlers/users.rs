//! Account endpoints: signup, login, password reset and self-service.

use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::auth::password::verify_password;
use crate::auth::reset::{self, ResetToken};
use crate::auth::sign_token;
use crate::config::config;
use crate::database::models::{PasswordChange, ProfileUpdate, User, UserCreate};
use crate::error::ApiError;
use crate::handlers::factory::create_one;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, CurrentUser, JWT_COOKIE};
use crate::services::Email;
use crate::AppState;

const LOGGED_OUT: &str = "loggedout";

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password_current: String,
    pub password: String,
    pub password_confirm: String,
}

fn session_cookie(value: &str, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        JWT_COOKIE, value, max_age_secs
    );
    if config().security.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Signs a token for `user` and answers with it in the body and the cookie
fn send_token(user: User, status: StatusCode) -> Result<Response, ApiError> {
    let token = sign_token(user.id)?;
    let max_age = config().security.jwt_cookie_expires_in_days * 24 * 60 * 60;
    let cookie = session_cookie(&token, max_age);
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        ApiResponse::with_status(user, status).with_token(token),
    )
        .into_response())
}

/// POST /users/signup
pub async fn signup(State(state): State<AppState>, ApiJson(body): ApiJson<SignupRequest>) -> Result<Response, ApiError> {
    let data = UserCreate {
        name: body.name,
        email: body.email,
        photo: None,
        role: None,
        password: body.password,
        password_confirm: body.password_confirm,
    };
    let user = create_one::<User>(&state.pool, data).await?;

    let url = format!("{}/api/v1/users/me", config().server.public_url);
    if let Err(e) = state.mailer.send(Email::welcome(&user, &url)).await {
        tracing::warn!("Welcome email to {} failed: {}", user.email, e);
    }

    send_token(user, StatusCode::CREATED)
}

/// POST /users/login
pub async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<LoginRequest>) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(ApiError::bad_request("Please provide email and password!"));
    };

    let user = User::find_by_email(&state.pool, &email)
        .await?
        .filter(|user| verify_password(&password, &user.password))
        .ok_or_else(|| ApiError::unauthorized("Incorrect email or password"))?;

    tracing::info!("User {} logged in", user.id);
    send_token(user, StatusCode::OK)
}

/// GET /users/logout: replaces the session cookie with a short-lived dummy
pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, session_cookie(LOGGED_OUT, 10))]),
        ApiResponse::success(()),
    )
}

/// POST /users/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<Value> {
    let email = body
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Please provide your email address"))?;

    let user = User::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("There is no user with that email address."))?;

    let ttl = config().security.password_reset_ttl_minutes;
    let reset = ResetToken::generate(ttl);
    User::set_reset_token(&state.pool, user.id, Some(&reset.digest), Some(reset.expires_at)).await?;

    let url = format!("{}/api/v1/users/reset-password/{}", config().server.public_url, reset.token);
    if let Err(e) = state.mailer.send(Email::password_reset(&user, &url, ttl)).await {
        tracing::error!("Password reset email to {} failed: {}", user.email, e);
        User::set_reset_token(&state.pool, user.id, None, None).await?;
        return Err(ApiError::internal_server_error(
            "There was an error sending the email. Try again later!",
        ));
    }

    Ok(ApiResponse::success(json!({ "message": "Token sent to email!" })))
}

/// PATCH /users/reset-password/:token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(body): ApiJson<PasswordChange>,
) -> Result<Response, ApiError> {
    let user = User::find_by_reset_digest(&state.pool, &reset::digest(&token))
        .await?
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    body.validate()?;
    let user = User::set_password(&state.pool, user.id, &body.password).await?;
    tracing::info!("User {} reset their password", user.id);
    send_token(user, StatusCode::OK)
}

/// PATCH /users/update-my-password
pub async fn update_my_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<UpdatePasswordRequest>,
) -> Result<Response, ApiError> {
    if !verify_password(&body.password_current, &user.password) {
        return Err(ApiError::unauthorized("Your current password is wrong."));
    }

    let change = PasswordChange {
        password: body.password,
        password_confirm: body.password_confirm,
    };
    change.validate()?;

    let user = User::set_password(&state.pool, user.id, &change.password).await?;
    send_token(user, StatusCode::OK)
}

/// GET /users/me
pub async fn get_me(CurrentUser(user): CurrentUser) -> ApiResult<User> {
    Ok(ApiResponse::success(user))
}

/// PATCH /users/update-me: only `name` and `email` are applied
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<User> {
    if ["password", "password_confirm", "password_current"]
        .iter()
        .any(|key| body.get(key).is_some())
    {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /update-my-password.",
        ));
    }

    let field = |key: &str, current: &str| -> Result<String, ApiError> {
        match body.get(key) {
            None | Some(Value::Null) => Ok(current.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ApiError::bad_request(format!("'{}' must be a string", key))),
        }
    };
    let profile = ProfileUpdate {
        name: field("name", &user.name)?,
        email: field("email", &user.email)?,
    };
    profile.validate()?;

    let user = User::update_profile(&state.pool, user.id, &profile).await?;
    Ok(ApiResponse::success(user))
}

/// DELETE /users/delete-me: deactivates the account
pub async fn delete_me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> ApiResult<()> {
    User::deactivate(&state.pool, user.id).await?;
    tracing::info!("User {} deactivated their account", user.id);
    Ok(ApiResponse::no_content())
}
