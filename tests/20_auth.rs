mod common;

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use natours_api::auth::{encode_claims, sign_token, Claims};
use natours_api::database::models::Role;

async fn get_me(app: &common::TestApp, token: Option<&str>) -> Result<(StatusCode, Value)> {
    let mut req = app.client.get(app.url("/api/v1/users/me"));
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    let res = req.send().await?;
    let status = res.status();
    Ok((status, res.json().await?))
}

#[tokio::test]
async fn protected_route_requires_token() -> Result<()> {
    let app = common::spawn_app().await?;

    let (status, body) = get_me(&app, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "You are not logged in! Please log in to get access.");
    Ok(())
}

#[tokio::test]
async fn tampered_token_is_rejected() -> Result<()> {
    let app = common::spawn_app().await?;

    let token = sign_token(Uuid::new_v4())?;
    let (head, _) = token.rsplit_once('.').expect("jwt has three parts");
    let tampered = format!("{}.{}", head, "c2lnbmF0dXJlLWZyb20tc29tZXdoZXJlLWVsc2U");

    let (status, body) = get_me(&app, Some(&tampered)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Please try to login again!");

    let (status, _) = get_me(&app, Some("not-a-jwt")).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn expired_token_is_rejected() -> Result<()> {
    let app = common::spawn_app().await?;

    let issued = Utc::now().timestamp() - 7200;
    let token = encode_claims(&Claims {
        sub: Uuid::new_v4(),
        iat: issued,
        exp: issued + 3600,
    })?;

    let (status, body) = get_me(&app, Some(&token)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Your token has expired! Login again!");
    Ok(())
}

#[tokio::test]
async fn logged_out_cookie_is_not_a_session() -> Result<()> {
    let app = common::spawn_app().await?;

    let res = app
        .client
        .get(app.url("/api/v1/users/me"))
        .header(header::COOKIE, "jwt=loggedout")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_overwrites_cookie() -> Result<()> {
    let app = common::spawn_app().await?;

    let res = app.client.get(app.url("/api/v1/users/logout")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("jwt=loggedout"), "cookie was {}", cookie);
    assert!(cookie.contains("Max-Age=10"));
    Ok(())
}

#[tokio::test]
async fn signup_login_and_me() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let email = common::unique_email("signup");

    let res = app
        .client
        .post(app.url("/api/v1/users/signup"))
        .json(&json!({
            "name": "Ada Lovelace",
            "email": email.to_uppercase(),
            "password": common::PASSWORD,
            "password_confirm": common::PASSWORD,
            "role": "admin"
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().get(header::SET_COOKIE).is_some());
    let body: Value = res.json().await?;
    assert!(body["token"].is_string());
    assert_eq!(body["data"]["email"], email);
    assert_eq!(body["data"]["role"], "user", "signup must ignore the requested role");
    assert!(body["data"].get("password").is_none());
    assert!(app.last_email_to(&email).is_some(), "welcome email was not sent");

    let token = common::login(&app, &email, common::PASSWORD).await?;
    let (status, me) = get_me(&app, Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["name"], "Ada Lovelace");

    // Wrong password and unknown email answer the same way
    for (login_email, password) in [(email.as_str(), "wrong-password"), ("nobody@example.com", common::PASSWORD)] {
        let res = app
            .client
            .post(app.url("/api/v1/users/login"))
            .json(&json!({ "email": login_email, "password": password }))
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await?;
        assert_eq!(body["message"], "Incorrect email or password");
    }
    Ok(())
}

#[tokio::test]
async fn signup_rejects_mismatched_passwords() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };

    let res = app
        .client
        .post(app.url("/api/v1/users/signup"))
        .json(&json!({
            "name": "Mismatch",
            "email": common::unique_email("mismatch"),
            "password": common::PASSWORD,
            "password_confirm": "something-else"
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_rejected() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (user, _) = common::user_with_role(&app, Role::User).await?;

    let res = app
        .client
        .post(app.url("/api/v1/users/signup"))
        .json(&json!({
            "name": "Copy Cat",
            "email": user.email,
            "password": common::PASSWORD,
            "password_confirm": common::PASSWORD
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("Duplicate field value"), "message was {}", message);
    Ok(())
}

#[tokio::test]
async fn role_restrictions_apply() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, token) = common::user_with_role(&app, Role::User).await?;

    let res = app
        .client
        .post(app.url("/api/v1/tours"))
        .bearer_auth(&token)
        .json(&common::tour_body(&common::unique_tour_name(), 500.0))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "You do not have permission to perform this action");

    let res = app.client.get(app.url("/api/v1/users")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn password_change_invalidates_older_tokens() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, old_token) = common::user_with_role(&app, Role::User).await?;

    // Change timestamps have second precision and are stamped one second back
    tokio::time::sleep(Duration::from_millis(2100)).await;

    let res = app
        .client
        .patch(app.url("/api/v1/users/update-my-password"))
        .bearer_auth(&old_token)
        .json(&json!({
            "password_current": "not-my-password",
            "password": "brand-new-pass",
            "password_confirm": "brand-new-pass"
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "Your current password is wrong.");

    let res = app
        .client
        .patch(app.url("/api/v1/users/update-my-password"))
        .bearer_auth(&old_token)
        .json(&json!({
            "password_current": common::PASSWORD,
            "password": "brand-new-pass",
            "password_confirm": "brand-new-pass"
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let new_token = body["token"].as_str().unwrap_or_default().to_string();

    let (status, body) = get_me(&app, Some(&old_token)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "User recently changed password! Please log in again.");

    let (status, _) = get_me(&app, Some(&new_token)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn update_me_and_delete_me() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (user, token) = common::user_with_role(&app, Role::User).await?;

    let res = app
        .client
        .patch(app.url("/api/v1/users/update-me"))
        .bearer_auth(&token)
        .json(&json!({ "password": "sneaky-change" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .client
        .patch(app.url("/api/v1/users/update-me"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Renamed User", "role": "admin" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["name"], "Renamed User");
    assert_eq!(body["data"]["email"], user.email);
    assert_eq!(body["data"]["role"], "user");

    let res = app
        .client
        .delete(app.url("/api/v1/users/delete-me"))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    // Inactive accounts can neither use their token nor log in again
    let (status, _) = get_me(&app, Some(&token)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(common::login(&app, &user.email, common::PASSWORD).await.is_err());
    Ok(())
}
