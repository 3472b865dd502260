use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::approvers::ApproverResolver;
use crate::config::OtpConfig;
use crate::directory::{DirectoryError, DirectoryStore, Identity};
use crate::notify::{Notifier, OtpNotification};

const APPROVER_SUBJECT: &str = "New User Registration OTP (Approval Required)";
const APPLICANT_SUBJECT: &str = "Your Registration OTP";

/// Bounded retry for the insert-with-unique-constraint allocation loop.
/// Conflicts only arise from other processes; within this process the
/// allocation mutex already serializes minting.
const MAX_ALLOC_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub role: String,
    pub device_unique_id: String,
    pub company_name: String,
    pub branch: String,
    pub sub_branch: String,
    pub password: String,
    #[serde(default)]
    pub mail: Option<String>,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// OTP absent, expired, or mismatched. A mismatch leaves the pending
    /// entry intact so the legitimate applicant can retry.
    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("Identity allocation failed: {0}")]
    IdAllocation(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Outcome of a submission. `NoApprovers` is a warning, not a failure: the
/// pending entry is retained and nothing was sent.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Pending { notified: usize },
    NoApprovers,
}

#[derive(Debug, Clone)]
struct PendingRegistration {
    code: String,
    payload: RegistrationRequest,
    issued_at: DateTime<Utc>,
}

/// Orchestrates OTP issuance, approver notification fan-out, OTP
/// verification, and identity creation.
pub struct RegistrationService {
    directory: Arc<dyn DirectoryStore>,
    notifier: Arc<dyn Notifier>,
    resolver: ApproverResolver,
    otp: OtpConfig,
    /// At most one pending registration per device; a new submission for the
    /// same device overwrites the prior one.
    pending: Mutex<HashMap<String, PendingRegistration>>,
    /// Serializes next_sequence + insert so concurrent verifications sharing
    /// a prefix never observe the same next number.
    alloc: Mutex<()>,
}

impl RegistrationService {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        notifier: Arc<dyn Notifier>,
        resolver: ApproverResolver,
        otp: OtpConfig,
    ) -> Self {
        Self {
            directory,
            notifier,
            resolver,
            otp,
            pending: Mutex::new(HashMap::new()),
            alloc: Mutex::new(()),
        }
    }

    /// Accept a registration, issue an OTP against the device, and notify
    /// the resolved approvers. The OTP is never returned to the caller.
    pub async fn submit(
        &self,
        payload: RegistrationRequest,
    ) -> Result<SubmitOutcome, RegistrationError> {
        validate(&payload)?;
        info!(
            "registration request received: {} ({})",
            payload.name, payload.role
        );

        let code = numeric_code(self.otp.digits);
        let notification = OtpNotification {
            applicant_name: payload.name.clone(),
            applicant_role: payload.role.clone(),
            code: code.clone(),
        };
        let applicant_mail = payload.mail.clone();
        let branch = payload.branch.clone();

        // The submission is pending from this point on, even if no approver
        // can be resolved below.
        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                payload.device_unique_id.clone(),
                PendingRegistration {
                    code,
                    payload,
                    issued_at: Utc::now(),
                },
            );
        }

        let sets = self.resolver.resolve(&branch);
        let business = self
            .directory
            .find_contacts_by_roles(&sets.business_roles, None)
            .await?;
        let it = self
            .directory
            .find_contacts_by_roles(&sets.it_roles, sets.it_branch.as_deref())
            .await?;

        let recipients = dedupe_contacts(business.into_iter().chain(it));
        if recipients.is_empty() {
            warn!("no approver contacts resolved for branch {:?}", branch);
            return Ok(SubmitOutcome::NoApprovers);
        }

        let mut notified = 0;
        for address in &recipients {
            notified += self.dispatch(address, APPROVER_SUBJECT, &notification).await;
        }
        info!("OTP sent to {} approver(s)", notified);

        if let Some(mail) = applicant_mail.as_deref().filter(|m| is_contact(m)) {
            notified += self.dispatch(mail, APPLICANT_SUBJECT, &notification).await;
        }

        Ok(SubmitOutcome::Pending { notified })
    }

    /// Consume the pending OTP for a device and mint the new identity.
    ///
    /// The identity is built from the payload captured at submit time, not
    /// from anything the verifying client re-supplies; only the device id
    /// selects the pending entry.
    pub async fn verify(&self, device_id: &str, code: &str) -> Result<String, RegistrationError> {
        let ttl = Duration::minutes(self.otp.pending_ttl_minutes);

        // Atomic check-and-take so a code can never be consumed twice
        let entry = {
            let mut pending = self.pending.lock().await;
            let entry = pending
                .remove(device_id)
                .ok_or(RegistrationError::InvalidOtp)?;
            if Utc::now() - entry.issued_at > ttl {
                // Stale entry is dropped rather than restored
                return Err(RegistrationError::InvalidOtp);
            }
            if entry.code != code {
                pending.insert(device_id.to_string(), entry);
                return Err(RegistrationError::InvalidOtp);
            }
            entry
        };

        match self.mint_identity(&entry.payload).await {
            Ok(user_id) => {
                info!("registration approved, user {} created", user_id);
                Ok(user_id)
            }
            Err(err) => {
                // No identity was written; restore the entry so the
                // applicant can retry once storage recovers.
                self.pending
                    .lock()
                    .await
                    .insert(device_id.to_string(), entry);
                Err(err)
            }
        }
    }

    async fn mint_identity(
        &self,
        payload: &RegistrationRequest,
    ) -> Result<String, RegistrationError> {
        let prefix = id_prefix(&payload.company_name, &payload.role, &payload.branch);

        let _guard = self.alloc.lock().await;
        for attempt in 1..=MAX_ALLOC_ATTEMPTS {
            let seq = self.directory.next_sequence(&prefix).await?;
            let user_id = format!("{}{:03}", prefix, seq);

            let identity = Identity {
                user_id: user_id.clone(),
                name: payload.name.clone(),
                role: payload.role.clone(),
                device_unique_id: payload.device_unique_id.clone(),
                company_name: payload.company_name.clone(),
                branch: payload.branch.clone(),
                sub_branch: payload.sub_branch.clone(),
                password: payload.password.clone(),
                mail: payload.mail.clone(),
            };

            match self.directory.insert_identity(&identity).await {
                Ok(()) => return Ok(user_id),
                Err(DirectoryError::Conflict(msg)) if attempt < MAX_ALLOC_ATTEMPTS => {
                    // Another writer (outside this process) took the id
                    warn!("allocation conflict on {} (attempt {}): {}", user_id, attempt, msg);
                }
                Err(DirectoryError::Conflict(msg)) => {
                    return Err(RegistrationError::IdAllocation(msg));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RegistrationError::IdAllocation(format!(
            "retries exhausted for prefix {}",
            prefix
        )))
    }

    #[cfg(test)]
    pub(crate) async fn pending_code(&self, device_id: &str) -> Option<String> {
        self.pending
            .lock()
            .await
            .get(device_id)
            .map(|entry| entry.code.clone())
    }

    /// Best-effort delivery; a failed recipient never aborts the rest.
    async fn dispatch(
        &self,
        address: &str,
        subject: &str,
        notification: &OtpNotification,
    ) -> usize {
        match self.notifier.send(address, subject, notification).await {
            Ok(()) => 1,
            Err(err) => {
                warn!("mail delivery to {} failed: {}", address, err);
                0
            }
        }
    }
}

fn validate(payload: &RegistrationRequest) -> Result<(), RegistrationError> {
    let required = [
        ("name", &payload.name),
        ("role", &payload.role),
        ("device_unique_id", &payload.device_unique_id),
        ("company_name", &payload.company_name),
        ("branch", &payload.branch),
        ("sub_branch", &payload.sub_branch),
        ("password", &payload.password),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(RegistrationError::MissingField(field.to_string()));
        }
    }
    Ok(())
}

/// Random numeric code of the given digit width, e.g. 4 -> 1000..=9999.
/// Width is clamped to 1..=9 digits.
fn numeric_code(digits: u32) -> String {
    let digits = digits.clamp(1, 9);
    let lower = 10u64.pow(digits - 1);
    let upper = 10u64.pow(digits);
    let code = rand::thread_rng().gen_range(lower..upper);
    code.to_string()
}

/// User-id prefix: first two letters each of company, role, and branch,
/// lowercased (e.g. "JL Mill" + "MD" + "Branch" -> "jlmdbr").
fn id_prefix(company: &str, role: &str, branch: &str) -> String {
    [company, role, branch]
        .iter()
        .flat_map(|part| part.chars().take(2))
        .collect::<String>()
        .to_lowercase()
}

/// Trim, drop empty/"none" placeholders, and deduplicate preserving order.
fn dedupe_contacts(addresses: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for address in addresses {
        let address = address.trim().to_string();
        if is_contact(&address) && !seen.contains(&address) {
            seen.push(address);
        }
    }
    seen
}

fn is_contact(address: &str) -> bool {
    let address = address.trim();
    !address.is_empty() && !address.eq_ignore_ascii_case("none")
}
