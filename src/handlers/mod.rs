use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::{json, Value};

use crate::directory::DirectoryStore;
use crate::state::AppState;

pub mod registration;
pub mod session;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Millgate",
            "version": version,
            "description": "Registration approval and session backend for the mill monitoring dashboard",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "register": "POST /register (public)",
                "verify": "POST /verify_otp (public)",
                "login": "POST /api/auth/login",
                "session_check": "POST /api/auth/session_check",
                "logout": "POST /api/auth/logout",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.directory.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "directory": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "directory store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "directory_error": e.to_string()
                }
            })),
        ),
    }
}
