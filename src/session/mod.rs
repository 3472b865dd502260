use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::directory::{DirectoryError, DirectoryStore, Session};

#[derive(Debug, Error)]
pub enum SessionError {
    /// Uniform failure for both "unknown user" and "wrong device", so a
    /// caller cannot enumerate which part was wrong.
    #[error("Invalid user or device")]
    InvalidCredentials,

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Minimal public profile returned on login.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginGrant {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/// Validation outcome. Expiry is evaluated lazily at read time; the stored
/// session is never touched by a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Valid { user_id: String },
    Expired,
    NotFound,
}

/// Creates, validates, and terminates time-bounded sessions.
pub struct SessionService {
    directory: Arc<dyn DirectoryStore>,
    lifetime: Duration,
}

impl SessionService {
    pub fn new(directory: Arc<dyn DirectoryStore>, config: &SessionConfig) -> Self {
        Self {
            directory,
            lifetime: Duration::hours(config.lifetime_hours),
        }
    }

    /// Authenticate a (user id, device id) bound pair and open a session.
    pub async fn login(&self, user_id: &str, device_id: &str) -> Result<LoginGrant, SessionError> {
        let identity = self
            .directory
            .find_user_by_id_and_device(user_id, device_id)
            .await?
            .ok_or_else(|| {
                warn!("invalid login attempt for user {}", user_id);
                SessionError::InvalidCredentials
            })?;

        let now = Utc::now();
        let session = Session {
            session_id: Uuid::new_v4(),
            user_id: identity.user_id.clone(),
            session_start_time: now,
            session_end_time: now + self.lifetime,
        };
        self.directory.insert_session(&session).await?;
        info!("session created for user {}", identity.user_id);

        Ok(LoginGrant {
            session_id: session.session_id,
            expires_at: session.session_end_time,
            user: UserProfile {
                user_id: identity.user_id,
                name: identity.name,
                role: identity.role,
            },
        })
    }

    /// Pure read plus a comparison; never mutates state, including on
    /// expiry detection.
    pub async fn validate(&self, session_id: Uuid) -> Result<SessionStatus, SessionError> {
        let session = match self.directory.find_session(session_id).await? {
            Some(session) => session,
            None => return Ok(SessionStatus::NotFound),
        };

        if Utc::now() > session.session_end_time {
            return Ok(SessionStatus::Expired);
        }

        Ok(SessionStatus::Valid {
            user_id: session.user_id,
        })
    }

    /// Soft-close the session by pulling its expiry to now. Idempotent, and
    /// a no-op success for unknown or already-dead sessions.
    pub async fn logout(&self, session_id: Uuid) -> Result<(), SessionError> {
        self.directory.close_session(session_id, Utc::now()).await?;
        info!("session {} terminated", session_id);
        Ok(())
    }
}
