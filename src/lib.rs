pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::HeaderValue,
    middleware::{self as axum_middleware, Next},
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::config;
use crate::database::models::{Booking, Review, Role, Tour, User};
use crate::handlers::{factory, reviews, system, tours, users};
use crate::middleware::{protect, restrict_to};
use crate::services::Mailer;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub mailer: Arc<dyn Mailer>,
}

const ADMIN: &[Role] = &[Role::Admin];
const ADMIN_LEAD_GUIDE: &[Role] = &[Role::Admin, Role::LeadGuide];
const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide, Role::Guide];
const USER: &[Role] = &[Role::User];
const USER_ADMIN: &[Role] = &[Role::User, Role::Admin];

/// Builds the full application router
pub fn app(state: AppState) -> Router {
    let server = &config().server;

    Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        // Resources
        .nest("/api/v1/tours", tour_routes(&state))
        .nest("/api/v1/users", user_routes(&state))
        .nest("/api/v1/reviews", review_routes(&state))
        .nest("/api/v1/bookings", booking_routes(&state))
        .fallback(system::not_found)
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
        .layer(DefaultBodyLimit::max(server.max_request_size_bytes))
        .with_state(state)
}

/// Requires a logged-in user for every route in `router`
fn protected(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(axum_middleware::from_fn_with_state(state.clone(), protect))
}

/// Requires a logged-in user holding one of `roles`
fn restricted(router: Router<AppState>, state: &AppState, roles: &'static [Role]) -> Router<AppState> {
    let router = router.route_layer(axum_middleware::from_fn(move |req: Request, next: Next| {
        restrict_to(roles, req, next)
    }));
    protected(router, state)
}

fn tour_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(factory::get_many::<Tour>))
        .route("/top-5-cheap", get(tours::top_five_cheap))
        .route(
            "/tours-within/:distance/center/:latlng/unit/:unit",
            get(tours::tours_within),
        )
        .route("/distances/:latlng/unit/:unit", get(tours::distances))
        .route("/:id", get(tours::get_tour));

    let members = Router::new()
        .route("/tour-stats", get(tours::tour_stats))
        .route("/:id/reviews", get(tours::get_tour_reviews));

    let staff = Router::new().route("/monthly-plan/:year", get(tours::monthly_plan));

    let managers = Router::new()
        .route("/", post(factory::create::<Tour>))
        .route("/:id", patch(factory::update::<Tour>).delete(factory::delete::<Tour>));

    let reviewers = Router::new().route("/:id/reviews", post(tours::create_tour_review));

    public
        .merge(protected(members, state))
        .merge(restricted(staff, state, STAFF))
        .merge(restricted(managers, state, ADMIN_LEAD_GUIDE))
        .merge(restricted(reviewers, state, USER))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(users::signup))
        .route("/login", post(users::login))
        .route("/logout", get(users::logout))
        .route("/forgot-password", post(users::forgot_password))
        .route("/reset-password/:token", patch(users::reset_password));

    let account = Router::new()
        .route("/update-my-password", patch(users::update_my_password))
        .route("/me", get(users::get_me))
        .route("/update-me", patch(users::update_me))
        .route("/delete-me", axum::routing::delete(users::delete_me));

    let admin = Router::new()
        .route("/", get(factory::get_many::<User>).post(factory::create::<User>))
        .route(
            "/:id",
            get(factory::get_one::<User>)
                .patch(factory::update::<User>)
                .delete(factory::delete::<User>),
        );

    public
        .merge(protected(account, state))
        .merge(restricted(admin, state, ADMIN))
}

fn review_routes(state: &AppState) -> Router<AppState> {
    let members = Router::new()
        .route("/", get(factory::get_many::<Review>))
        .route("/:id", get(factory::get_one::<Review>));

    let authors = Router::new().route("/", post(reviews::create_review));

    let editors = Router::new().route(
        "/:id",
        patch(factory::update::<Review>).delete(factory::delete::<Review>),
    );

    protected(members, state)
        .merge(restricted(authors, state, USER))
        .merge(restricted(editors, state, USER_ADMIN))
}

fn booking_routes(state: &AppState) -> Router<AppState> {
    let bookings = Router::new()
        .route("/", get(factory::get_many::<Booking>).post(factory::create::<Booking>))
        .route(
            "/:id",
            get(factory::get_one::<Booking>)
                .patch(factory::update::<Booking>)
                .delete(factory::delete::<Booking>),
        );

    restricted(bookings, state, ADMIN_LEAD_GUIDE)
}

fn cors_layer() -> CorsLayer {
    let security = &config().security;
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
