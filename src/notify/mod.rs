use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub mod smtp;

pub use smtp::SmtpNotifier;

/// Details carried by an approval-request notification. The OTP is included
/// in the message body and nowhere else.
#[derive(Debug, Clone)]
pub struct OtpNotification {
    pub applicant_name: String,
    pub applicant_role: String,
    pub code: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid recipient address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Delivery failed: {0}")]
    Transport(String),
}

/// Fire-and-forget message delivery. The registration flow logs failures and
/// continues; no delivery guarantee is assumed.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        notification: &OtpNotification,
    ) -> Result<(), NotifyError>;
}

/// Notifier for development without an SMTP relay: logs the attempt and
/// reports success. The OTP itself is kept out of the log line.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        notification: &OtpNotification,
    ) -> Result<(), NotifyError> {
        info!(
            "mail delivery skipped (no SMTP configured): to={} subject={:?} applicant={}",
            address, subject, notification.applicant_name
        );
        Ok(())
    }
}
