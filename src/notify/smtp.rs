use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{Notifier, NotifyError, OtpNotification};
use crate::config::MailConfig;

/// SMTP notifier delivering approval-request mail over STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let from = config
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::InvalidAddress(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }

    fn body(notification: &OtpNotification) -> String {
        format!(
            "Dear Sir/Madam,\n\n\
             A new user registration request has been submitted and requires your review.\n\n\
             Applicant Details:\n\
             - Name : {}\n\
             - Role : {}\n\n\
             Verification OTP: {}\n\n\
             Please use the above OTP to authorize this registration request.\n\n\
             Regards,\n",
            notification.applicant_name, notification.applicant_role, notification.code
        )
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        notification: &OtpNotification,
    ) -> Result<(), NotifyError> {
        let to = address
            .parse::<Mailbox>()
            .map_err(|e| NotifyError::InvalidAddress(e.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(Self::body(notification))
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        debug!("mail sent to {}", address);
        Ok(())
    }
}
