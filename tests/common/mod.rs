use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use millgate::approvers::ApproverResolver;
use millgate::config::{ApproverConfig, OtpConfig, SessionConfig};
use millgate::directory::{Identity, MemoryDirectoryStore};
use millgate::notify::{Notifier, NotifyError, OtpNotification};
use millgate::registration::RegistrationService;
use millgate::session::SessionService;
use millgate::AppState;

/// Captures every delivery attempt so tests can read the OTP that was sent.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMail>>,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub code: String,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// The OTP carried by the most recent mail.
    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|m| m.code.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        notification: &OtpNotification,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentMail {
            to: address.to_string(),
            subject: subject.to_string(),
            code: notification.code.clone(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryDirectoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    /// App wired to in-memory backends with the reference deployment's
    /// approver roles and a 4-digit OTP.
    pub fn new() -> Self {
        let store = Arc::new(MemoryDirectoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let resolver = ApproverResolver::new(&ApproverConfig {
            business_roles: vec!["MD".into(), "JMD".into(), "GM".into(), "AGM".into()],
            it_roles: vec!["IT HEAD".into()],
            it_branch_restricted: true,
        });

        let state = AppState {
            registration: Arc::new(RegistrationService::new(
                store.clone(),
                notifier.clone(),
                resolver,
                OtpConfig {
                    digits: 4,
                    pending_ttl_minutes: 15,
                },
            )),
            sessions: Arc::new(SessionService::new(
                store.clone(),
                &SessionConfig { lifetime_hours: 5 },
            )),
            directory: store.clone(),
        };

        Self {
            app: millgate::app(state),
            store,
            notifier,
        }
    }

    pub async fn seed_approver(&self, role: &str, branch: &str, mail: &str) {
        self.store
            .seed_identity(Identity {
                user_id: format!("seed-{}", mail),
                name: "Approver".to_string(),
                role: role.to_string(),
                device_unique_id: format!("seed-dev-{}", mail),
                company_name: "JL Mill".to_string(),
                branch: branch.to_string(),
                sub_branch: "HQ".to_string(),
                password: "secret".to_string(),
                mail: Some(mail.to_string()),
            })
            .await;
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?;

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, value))
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let request = Request::builder().method("GET").uri(path).body(Body::empty())?;
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&bytes)?))
    }
}

/// A well-formed registration payload for the given device.
pub fn registration_payload(device: &str) -> Value {
    serde_json::json!({
        "name": "Asha",
        "role": "MD",
        "device_unique_id": device,
        "company_name": "JL Mill",
        "branch": "North",
        "sub_branch": "A",
        "password": "secret",
    })
}
