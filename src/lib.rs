use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/auth", auth_routes(app_state.clone()))
        .nest("/api/challenges-list", challenge_list_routes())
        .nest(
            "/api/challenges-func",
            challenge_func_routes(app_state.clone()),
        )
        .route("/api/img/{image_id}", get(handlers::image::get_image))
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn challenge_list_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/get-all", get(handlers::challenges::get_all_challenges))
        .route("/get/{challenge_id}", get(handlers::challenges::get_challenge))
}

fn challenge_func_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    // Trial scoring is the only unauthenticated entry point here: no
    // persistence, so no per-user state to protect.
    let public_routes = Router::new().route(
        "/submit-for-trial",
        post(handlers::challenge_func::submit_for_trial),
    );

    let protected_routes = Router::new()
        .route(
            "/start-challenge",
            post(handlers::challenge_func::start_challenge),
        )
        .route("/submit", post(handlers::challenge_func::submit))
        .route(
            "/get-challenge-progress",
            get(handlers::challenge_func::get_challenge_progress),
        )
        .route(
            "/give-up-challenge",
            get(handlers::challenge_func::give_up_challenge),
        )
        .route(
            "/complete-challenge",
            get(handlers::challenge_func::complete_challenge),
        )
        .route(
            "/get-all-submission",
            get(handlers::challenge_func::get_all_submissions),
        )
        .route(
            "/get-submission/{submission_id}",
            get(handlers::challenge_func::get_submission),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn auth_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/register", post(handlers::auth::register))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let refresh_route = Router::new().route("/refresh", post(handlers::auth::refresh_token));

    let public_routes = login_route.merge(refresh_route);

    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::get_current_user))
        .route("/is-logged-in", get(handlers::auth::is_logged_in))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}
