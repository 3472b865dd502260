use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryDirectoryStore;
pub use postgres::PgDirectoryStore;

/// Errors from the directory store boundary
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation (user id or device already registered)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for DirectoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DirectoryError::Conflict(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DirectoryError::Connection(err.to_string())
            }
            _ => DirectoryError::Sqlx(err),
        }
    }
}

/// A registered user. Written exactly once, by successful OTP verification;
/// never mutated by this service afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    pub role: String,
    pub device_unique_id: String,
    pub company_name: String,
    pub branch: String,
    pub sub_branch: String,
    pub password: String,
    pub mail: Option<String>,
}

/// A login session with absolute expiry. Termination soft-closes the record
/// (expiry pulled to "now") so the row survives for audit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub session_start_time: DateTime<Utc>,
    pub session_end_time: DateTime<Utc>,
}

/// Durable storage for identities and sessions.
///
/// The service owns none of the schema; this trait is the whole contract.
/// Backed by Postgres in production and an in-memory map in tests and
/// database-less development.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Liveness probe for the health endpoint. In-process stores are always
    /// reachable; the Postgres store pings its pool.
    async fn ping(&self) -> Result<(), DirectoryError> {
        Ok(())
    }

    /// Contact addresses of identities whose role is in `roles`, optionally
    /// filtered by branch. Role and branch comparisons are case-insensitive.
    /// Identities without a contact address are skipped.
    async fn find_contacts_by_roles(
        &self,
        roles: &[String],
        branch: Option<&str>,
    ) -> Result<Vec<String>, DirectoryError>;

    /// Look up an identity by the (user id, device id) bound pair.
    async fn find_user_by_id_and_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Identity>, DirectoryError>;

    /// Next unused sequence number for a user-id prefix (starts at 1).
    /// Callers must serialize allocation per prefix; see RegistrationService.
    async fn next_sequence(&self, prefix: &str) -> Result<u32, DirectoryError>;

    /// Insert a new identity. `Conflict` when the user id or device id is
    /// already registered.
    async fn insert_identity(&self, identity: &Identity) -> Result<(), DirectoryError>;

    async fn insert_session(&self, session: &Session) -> Result<(), DirectoryError>;

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, DirectoryError>;

    /// Soft-close: set expiry to `min(current expiry, at)`. A no-op for
    /// sessions that are already expired or unknown.
    async fn close_session(&self, session_id: Uuid, at: DateTime<Utc>)
        -> Result<(), DirectoryError>;
}
