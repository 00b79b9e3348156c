mod common;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use natours_api::auth::reset::{self, ResetToken};
use natours_api::database::models::{Role, User};

async fn forgot(app: &common::TestApp, email: &str) -> Result<reqwest::Response> {
    Ok(app
        .client
        .post(app.url("/api/v1/users/forgot-password"))
        .json(&json!({ "email": email }))
        .send()
        .await?)
}

async fn reset_with(app: &common::TestApp, token: &str, password: &str) -> Result<reqwest::Response> {
    Ok(app
        .client
        .patch(app.url(&format!("/api/v1/users/reset-password/{}", token)))
        .json(&json!({ "password": password, "password_confirm": password }))
        .send()
        .await?)
}

/// The token is the last path segment of the emailed link
fn token_from_email(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|word| word.contains("/reset-password/"))
        .and_then(|url| url.rsplit('/').next())
        .map(str::to_string)
}

#[tokio::test]
async fn reset_token_works_once() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (user, _) = common::user_with_role(&app, Role::User).await?;

    let res = forgot(&app, &user.email).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let email = app.last_email_to(&user.email).context("reset email not sent")?;
    let token = token_from_email(&email.text).context("no link in reset email")?;

    let res = reset_with(&app, &token, "a-fresh-password").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert!(body["token"].is_string());

    common::login(&app, &user.email, "a-fresh-password").await?;
    assert!(common::login(&app, &user.email, common::PASSWORD).await.is_err());

    // Single use
    let res = reset_with(&app, &token, "yet-another-password").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Token is invalid or has expired");
    Ok(())
}

#[tokio::test]
async fn expired_reset_token_is_rejected() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (user, _) = common::user_with_role(&app, Role::User).await?;

    let stale = ResetToken::generate(10);
    User::set_reset_token(&app.pool, user.id, Some(&stale.digest), Some(Utc::now() - Duration::minutes(1))).await?;

    let res = reset_with(&app, &stale.token, "a-fresh-password").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Same digest inside its window is accepted
    User::set_reset_token(&app.pool, user.id, Some(&reset::digest(&stale.token)), Some(stale.expires_at)).await?;
    let res = reset_with(&app, &stale.token, "a-fresh-password").await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn unknown_email_is_404() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };

    let res = forgot(&app, &common::unique_email("ghost")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn failed_delivery_clears_token() -> Result<()> {
    let Some(app) = common::spawn_app_with_failing_mailer().await? else {
        return Ok(());
    };
    let (user, _) = common::user_with_role(&app, Role::User).await?;

    let res = forgot(&app, &user.email).await?;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "There was an error sending the email. Try again later!");

    let stored: Option<String> = sqlx::query_scalar("SELECT password_reset_token FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_one(&app.pool)
        .await?;
    assert!(stored.is_none());
    Ok(())
}
