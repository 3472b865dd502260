mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{registration_payload, TestApp};
use serde_json::json;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    Ok(())
}

#[tokio::test]
async fn full_approval_flow_mints_user_and_opens_session() -> Result<()> {
    let app = TestApp::new();
    app.seed_approver("MD", "South", "alice@x.com").await;

    // Submit: one approver on file, applicant supplied a mail address
    let mut payload = registration_payload("D1");
    payload["mail"] = json!("asha@x.com");
    let (status, body) = app.post("/register", payload.clone()).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"].get("warning").is_none());

    // Exactly one approver mail plus the applicant copy, same 4-digit code
    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "alice@x.com");
    assert_eq!(sent[1].to, "asha@x.com");
    assert_eq!(sent[0].code, sent[1].code);
    assert_eq!(sent[0].code.len(), 4);
    assert!(sent[0].code.chars().all(|c| c.is_ascii_digit()));
    let code = sent[0].code.clone();

    // The response never leaks the code
    assert!(!body.to_string().contains(&code));

    // Verify mints the expected prefixed id
    let (status, body) = app
        .post("/verify_otp", json!({ "otp": code, "registration_data": payload }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user_id"], "jlmdno001");

    // The freshly minted identity can log in on the approved device
    let (status, body) = app
        .post("/api/auth/login", json!({ "user_id": "jlmdno001", "device_id": "D1" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["name"], "Asha");
    let session_id = body["data"]["session"]["session_id"].clone();

    let (status, body) = app
        .post("/api/auth/session_check", json!({ "session_id": session_id }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], true);
    assert_eq!(body["data"]["user_id"], "jlmdno001");
    Ok(())
}

#[tokio::test]
async fn otp_is_single_use() -> Result<()> {
    let app = TestApp::new();
    app.seed_approver("GM", "South", "gm@x.com").await;

    let payload = registration_payload("D1");
    app.post("/register", payload.clone()).await?;
    let code = app.notifier.last_code().unwrap();

    let verify = json!({ "otp": code, "registration_data": payload });
    let (status, _) = app.post("/verify_otp", verify.clone()).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.post("/verify_otp", verify).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn wrong_otp_is_rejected_but_retry_still_works() -> Result<()> {
    let app = TestApp::new();
    app.seed_approver("MD", "South", "alice@x.com").await;

    let payload = registration_payload("D1");
    app.post("/register", payload.clone()).await?;
    let code = app.notifier.last_code().unwrap();
    let wrong = if code == "0000" { "0001" } else { "0000" };

    let (status, _) = app
        .post("/verify_otp", json!({ "otp": wrong, "registration_data": payload.clone() }))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The pending entry survived the bad attempt
    let (status, body) = app
        .post("/verify_otp", json!({ "otp": code, "registration_data": payload }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user_id"], "jlmdno001");
    Ok(())
}

#[tokio::test]
async fn no_approvers_yields_warning_and_no_mail() -> Result<()> {
    let app = TestApp::new();
    // Nothing seeded: no business approver and no IT approver in any branch

    let (status, body) = app.post("/register", registration_payload("D1")).await?;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["warning"], "no_approvers");
    assert!(app.notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_fields_are_rejected_before_any_side_effect() -> Result<()> {
    let app = TestApp::new();
    app.seed_approver("MD", "South", "alice@x.com").await;

    let mut payload = registration_payload("D1");
    payload["branch"] = json!("   ");
    let (status, body) = app.post("/register", payload).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["field"], "branch");
    assert!(app.notifier.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn sequence_numbers_advance_per_prefix() -> Result<()> {
    let app = TestApp::new();
    app.seed_approver("MD", "South", "alice@x.com").await;

    for (device, expected) in [("D1", "jlmdno001"), ("D2", "jlmdno002")] {
        let payload = registration_payload(device);
        app.post("/register", payload.clone()).await?;
        let code = app.notifier.last_code().unwrap();
        let (status, body) = app
            .post("/verify_otp", json!({ "otp": code, "registration_data": payload }))
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["user_id"], expected);
    }
    Ok(())
}
