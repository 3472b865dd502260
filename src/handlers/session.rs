use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult};
use crate::session::SessionStatus;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: Uuid,
}

/// POST /api/auth/login - authenticate the (user id, device id) pair and
/// open a session. Failures are uniform regardless of which check failed.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Value> {
    let grant = state.sessions.login(&req.user_id, &req.device_id).await?;

    Ok(ApiResponse::success(json!({
        "message": "Login successful",
        "session": {
            "session_id": grant.session_id,
            "expires_at": grant.expires_at,
        },
        "user": grant.user,
    })))
}

/// POST /api/auth/session_check - report whether a session is still live.
///
/// Invalid sessions are a normal 200 response with a reason, so callers can
/// tell "re-login needed" (expired) apart from "no such session".
pub async fn session_check(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<Value> {
    let body = match state.sessions.validate(req.session_id).await? {
        SessionStatus::Valid { user_id } => json!({
            "valid": true,
            "user_id": user_id,
        }),
        SessionStatus::Expired => json!({
            "valid": false,
            "reason": "expired",
        }),
        SessionStatus::NotFound => json!({
            "valid": false,
            "reason": "not_found",
        }),
    };

    Ok(ApiResponse::success(body))
}

/// POST /api/auth/logout - soft-close a session. Idempotent; unknown ids are
/// a no-op success.
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<Value> {
    state.sessions.logout(req.session_id).await?;
    Ok(ApiResponse::success(json!({ "ok": true })))
}
