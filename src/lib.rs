use axum::routing::{get, post};
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod approvers;
pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notify;
pub mod registration;
pub mod session;
pub mod state;

pub use state::AppState;

/// Build the application router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Registration flow
        .route("/register", post(handlers::registration::register))
        .route("/verify_otp", post(handlers::registration::verify_otp))
        // Session lifecycle
        .route("/api/auth/login", post(handlers::session::login))
        .route("/api/auth/session_check", post(handlers::session::session_check))
        .route("/api/auth/logout", post(handlers::session::logout))
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
