#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use natours_api::database::models::{Model, Role, User, UserCreate};
use natours_api::database::DatabaseManager;
use natours_api::services::{Email, MailError, Mailer};
use natours_api::{app, AppState};

pub const PASSWORD: &str = "test-pass-1234";

/// Keeps every message instead of delivering it
#[derive(Clone, Default)]
pub struct CapturingMailer {
    pub sent: Arc<Mutex<Vec<Email>>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent.lock().expect("mailer lock").push(email);
        Ok(())
    }
}

/// Rejects every message
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: Email) -> Result<(), MailError> {
        Err(MailError::Rejected("test transport is down".to_string()))
    }
}

pub struct TestApp {
    pub base_url: String,
    pub pool: PgPool,
    pub mailer: CapturingMailer,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// The most recent email sent to `to`
    pub fn last_email_to(&self, to: &str) -> Option<Email> {
        self.mailer
            .sent
            .lock()
            .expect("mailer lock")
            .iter()
            .rev()
            .find(|email| email.to == to)
            .cloned()
    }
}

/// True when a PostgreSQL database is configured for the tests
pub fn database_available() -> bool {
    std::env::var("DATABASE_URL").is_ok()
}

async fn serve(state: AppState) -> Result<String> {
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("failed to bind port {}", port))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app(state)).await;
    });
    Ok(format!("http://127.0.0.1:{}", port))
}

/// Starts the app in-process on a free port. The pool connects lazily, so
/// routes that reject before touching the database work without one.
pub async fn spawn_app() -> Result<TestApp> {
    let pool = DatabaseManager::connect_lazy()?;
    let mailer = CapturingMailer::default();
    let state = AppState {
        pool: pool.clone(),
        mailer: Arc::new(mailer.clone()),
    };
    let base_url = serve(state).await?;
    Ok(TestApp {
        base_url,
        pool,
        mailer,
        client: reqwest::Client::new(),
    })
}

/// Like [`spawn_app`], but connected and migrated. `None` without a database.
pub async fn spawn_app_with_db() -> Result<Option<TestApp>> {
    if !database_available() {
        eprintln!("DATABASE_URL not set; skipping");
        return Ok(None);
    }
    let app = spawn_app().await?;
    DatabaseManager::run_migrations(&app.pool).await?;
    Ok(Some(app))
}

/// Same as [`spawn_app_with_db`] with a mailer that always fails
pub async fn spawn_app_with_failing_mailer() -> Result<Option<TestApp>> {
    if !database_available() {
        return Ok(None);
    }
    let pool = DatabaseManager::connect_lazy()?;
    DatabaseManager::run_migrations(&pool).await?;
    let state = AppState {
        pool: pool.clone(),
        mailer: Arc::new(FailingMailer),
    };
    let base_url = serve(state).await?;
    Ok(Some(TestApp {
        base_url,
        pool,
        mailer: CapturingMailer::default(),
        client: reqwest::Client::new(),
    }))
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

/// Unique tour name within the 10-40 character rule
pub fn unique_tour_name() -> String {
    format!("Test Tour {}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Inserts a user with `role` directly and returns (user, session token)
pub async fn user_with_role(app: &TestApp, role: Role) -> Result<(User, String)> {
    let email = unique_email(role.as_str());
    let user = User::insert(
        &app.pool,
        UserCreate {
            name: format!("Test {}", role.as_str()),
            email: email.clone(),
            photo: None,
            role: Some(role),
            password: PASSWORD.to_string(),
            password_confirm: PASSWORD.to_string(),
        },
    )
    .await?;
    let token = login(app, &email, PASSWORD).await?;
    Ok((user, token))
}

pub async fn login(app: &TestApp, email: &str, password: &str) -> Result<String> {
    let res = app
        .client
        .post(app.url("/api/v1/users/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
    let body: Value = res.json().await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("login response has no token")
}

pub fn tour_body(name: &str, price: f64) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "max_group_size": 12,
        "difficulty": "medium",
        "price": price,
        "summary": "A tour created by the integration tests",
        "start_dates": ["2031-03-10T09:00:00Z", "2031-07-01T09:00:00Z"],
        "start_location": {
            "type": "Point",
            "coordinates": [-115.570154, 51.178456],
            "address": "224 Banff Ave, Banff, AB, Canada"
        }
    })
}

/// Creates a tour through the API as `token` and returns its JSON
pub async fn create_tour(app: &TestApp, token: &str, body: Value) -> Result<Value> {
    let res = app
        .client
        .post(app.url("/api/v1/tours"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "tour create failed: {}", res.status());
    let body: Value = res.json().await?;
    Ok(body["data"].clone())
}
