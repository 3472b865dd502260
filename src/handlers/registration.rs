use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult};
use crate::registration::{RegistrationRequest, SubmitOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: String,
    /// The original payload echoed back by the client. Only its device id is
    /// used; the identity is minted from the payload captured at submit.
    pub registration_data: RegistrationRequest,
}

/// POST /register - accept a registration and notify approvers.
///
/// Responds 202 with `status: "pending"` either way; when no approver could
/// be resolved the body carries a `no_approvers` warning and nothing was
/// sent. The OTP is never part of the response.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegistrationRequest>,
) -> ApiResult<Value> {
    let outcome = state.registration.submit(payload).await?;

    let body = match outcome {
        SubmitOutcome::Pending { .. } => json!({
            "status": "pending",
            "message": "OTP sent to approvers"
        }),
        SubmitOutcome::NoApprovers => json!({
            "status": "pending",
            "warning": "no_approvers",
            "message": "No approver emails found. Registration pending manual review."
        }),
    };

    Ok(ApiResponse::accepted(body))
}

/// POST /verify_otp - consume the OTP for a device and create the user.
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<Value> {
    let user_id = state
        .registration
        .verify(&req.registration_data.device_unique_id, &req.otp)
        .await?;

    Ok(ApiResponse::created(json!({
        "user_id": user_id,
        "message": "User registered successfully"
    })))
}
