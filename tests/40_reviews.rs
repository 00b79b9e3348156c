mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use natours_api::database::models::Role;

async fn tour_ratings(app: &common::TestApp, id: &str) -> Result<(f64, i64)> {
    let res = app.client.get(app.url(&format!("/api/v1/tours/{}", id))).send().await?;
    let body: Value = res.json().await?;
    Ok((
        body["data"]["ratings_average"].as_f64().unwrap_or_default(),
        body["data"]["ratings_quantity"].as_i64().unwrap_or_default(),
    ))
}

async fn post_review(app: &common::TestApp, token: &str, tour_id: &str, rating: f64) -> Result<reqwest::Response> {
    Ok(app
        .client
        .post(app.url(&format!("/api/v1/tours/{}/reviews", tour_id)))
        .bearer_auth(token)
        .json(&json!({ "review": "Loved every minute of it", "rating": rating }))
        .send()
        .await?)
}

#[tokio::test]
async fn one_review_per_user_and_tour() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, admin) = common::user_with_role(&app, Role::Admin).await?;
    let (_, user) = common::user_with_role(&app, Role::User).await?;
    let tour = common::create_tour(&app, &admin, common::tour_body(&common::unique_tour_name(), 300.0)).await?;
    let tour_id = tour["id"].as_str().unwrap_or_default();

    let res = post_review(&app, &user, tour_id, 4.0).await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = post_review(&app, &user, tour_id, 5.0).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["message"], "You have already reviewed this tour");
    Ok(())
}

#[tokio::test]
async fn rating_outside_range_is_rejected() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, admin) = common::user_with_role(&app, Role::Admin).await?;
    let (_, user) = common::user_with_role(&app, Role::User).await?;
    let tour = common::create_tour(&app, &admin, common::tour_body(&common::unique_tour_name(), 300.0)).await?;
    let tour_id = tour["id"].as_str().unwrap_or_default();

    for rating in [0.0, 5.5] {
        let res = post_review(&app, &user, tour_id, rating).await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "rating {} accepted", rating);
    }
    Ok(())
}

#[tokio::test]
async fn only_users_write_reviews() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, admin) = common::user_with_role(&app, Role::Admin).await?;
    let tour = common::create_tour(&app, &admin, common::tour_body(&common::unique_tour_name(), 300.0)).await?;
    let tour_id = tour["id"].as_str().unwrap_or_default();

    let res = post_review(&app, &admin, tour_id, 4.0).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn rating_aggregate_follows_reviews() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, admin) = common::user_with_role(&app, Role::Admin).await?;
    let (_, first) = common::user_with_role(&app, Role::User).await?;
    let (second_user, second) = common::user_with_role(&app, Role::User).await?;
    let tour = common::create_tour(&app, &admin, common::tour_body(&common::unique_tour_name(), 300.0)).await?;
    let tour_id = tour["id"].as_str().unwrap_or_default();

    assert_eq!(tour_ratings(&app, tour_id).await?, (4.5, 0));

    assert_eq!(post_review(&app, &first, tour_id, 5.0).await?.status(), StatusCode::CREATED);
    let res = post_review(&app, &second, tour_id, 2.0).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let review: Value = res.json().await?;
    assert_eq!(review["data"]["user_id"], json!(second_user.id));
    assert_eq!(tour_ratings(&app, tour_id).await?, (3.5, 2));

    // Nested listing is scoped to the tour and populates authors
    let res = app
        .client
        .get(app.url(&format!("/api/v1/tours/{}/reviews", tour_id)))
        .bearer_auth(&first)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["results"], 2);
    assert!(body["data"][0]["user"]["name"].is_string());

    let review_id = review["data"]["id"].as_str().unwrap_or_default();
    let res = app
        .client
        .patch(app.url(&format!("/api/v1/reviews/{}", review_id)))
        .bearer_auth(&second)
        .json(&json!({ "rating": 4 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(tour_ratings(&app, tour_id).await?, (4.5, 2));

    let res = app
        .client
        .delete(app.url(&format!("/api/v1/reviews/{}", review_id)))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(tour_ratings(&app, tour_id).await?, (5.0, 1));
    Ok(())
}

#[tokio::test]
async fn review_for_missing_tour_is_404() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, user) = common::user_with_role(&app, Role::User).await?;

    let res = post_review(&app, &user, &uuid::Uuid::new_v4().to_string(), 4.0).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn deleting_a_reviewer_recomputes_ratings() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, admin) = common::user_with_role(&app, Role::Admin).await?;
    let (author, token) = common::user_with_role(&app, Role::User).await?;
    let tour = common::create_tour(&app, &admin, common::tour_body(&common::unique_tour_name(), 300.0)).await?;
    let tour_id = tour["id"].as_str().unwrap_or_default();

    assert_eq!(post_review(&app, &token, tour_id, 1.0).await?.status(), StatusCode::CREATED);
    assert_eq!(tour_ratings(&app, tour_id).await?, (1.0, 1));

    let res = app
        .client
        .delete(app.url(&format!("/api/v1/users/{}", author.id)))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(tour_ratings(&app, tour_id).await?, (4.5, 0));
    Ok(())
}

#[tokio::test]
async fn secret_tour_rejects_reviews_on_both_routes() -> Result<()> {
    let Some(app) = common::spawn_app_with_db().await? else {
        return Ok(());
    };
    let (_, admin) = common::user_with_role(&app, Role::Admin).await?;
    let (_, user) = common::user_with_role(&app, Role::User).await?;
    let mut body = common::tour_body(&common::unique_tour_name(), 300.0);
    body["secret_tour"] = json!(true);
    let tour = common::create_tour(&app, &admin, body).await?;
    let tour_id = tour["id"].as_str().unwrap_or_default();

    let res = post_review(&app, &user, tour_id, 4.0).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app
        .client
        .post(app.url("/api/v1/reviews"))
        .bearer_auth(&user)
        .json(&json!({ "review": "Nobody should find this", "rating": 4, "tour_id": tour_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE tour_id = $1::uuid")
        .bind(tour_id)
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(reviews, 0);
    Ok(())
}
