use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{DirectoryError, DirectoryStore, Identity, Session};
use crate::config;

/// Postgres-backed directory store over the reference deployment schema
/// (`user_data` and `session_db` tables).
pub struct PgDirectoryStore {
    pool: PgPool,
}

impl PgDirectoryStore {
    /// Connect using `DATABASE_URL` and the configured pool settings.
    pub async fn connect() -> Result<Self, DirectoryError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| DirectoryError::Connection("DATABASE_URL is not set".to_string()))?;

        let db = &config::config().database;
        let pool = PgPoolOptions::new()
            .max_connections(db.max_connections)
            .acquire_timeout(Duration::from_secs(db.connection_timeout_secs))
            .connect(&url)
            .await?;

        info!("Connected to directory database");
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DirectoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for PgDirectoryStore {
    async fn ping(&self) -> Result<(), DirectoryError> {
        self.health_check().await
    }

    async fn find_contacts_by_roles(
        &self,
        roles: &[String],
        branch: Option<&str>,
    ) -> Result<Vec<String>, DirectoryError> {
        if roles.is_empty() {
            return Ok(vec![]);
        }

        // Uppercase the bound list so matching stays case-insensitive no
        // matter how the caller spells the role names
        let roles: Vec<String> = roles.iter().map(|r| r.to_uppercase()).collect();

        let rows = match branch {
            Some(branch) => {
                sqlx::query(
                    "SELECT mail FROM user_data
                     WHERE UPPER(role) = ANY($1) AND UPPER(branch) = UPPER($2)
                       AND mail IS NOT NULL",
                )
                .bind(&roles)
                .bind(branch)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT mail FROM user_data
                     WHERE UPPER(role) = ANY($1) AND mail IS NOT NULL",
                )
                .bind(&roles)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(|r| r.get::<String, _>("mail")).collect())
    }

    async fn find_user_by_id_and_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Identity>, DirectoryError> {
        let identity = sqlx::query_as::<_, Identity>(
            "SELECT user_id, name, role, device_unique_id, company_name,
                    branch, sub_branch, password, mail
             FROM user_data
             WHERE user_id = $1 AND device_unique_id = $2",
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn next_sequence(&self, prefix: &str) -> Result<u32, DirectoryError> {
        let rows = sqlx::query("SELECT user_id FROM user_data WHERE user_id LIKE $1")
            .bind(format!("{}%", prefix))
            .fetch_all(&self.pool)
            .await?;

        // Ids that do not end in a parseable sequence number are ignored,
        // matching the reference deployment's tolerance for legacy rows.
        let max = rows
            .into_iter()
            .filter_map(|r| {
                let id: String = r.get("user_id");
                id.get(id.len().saturating_sub(3)..)?.parse::<u32>().ok()
            })
            .max()
            .unwrap_or(0);

        Ok(max + 1)
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<(), DirectoryError> {
        sqlx::query(
            "INSERT INTO user_data
                 (user_id, name, role, device_unique_id, company_name,
                  branch, sub_branch, password, mail)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&identity.user_id)
        .bind(&identity.name)
        .bind(&identity.role)
        .bind(&identity.device_unique_id)
        .bind(&identity.company_name)
        .bind(&identity.branch)
        .bind(&identity.sub_branch)
        .bind(&identity.password)
        .bind(&identity.mail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), DirectoryError> {
        sqlx::query(
            "INSERT INTO session_db
                 (session_id, user_id, session_start_time, session_end_time)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(session.session_id)
        .bind(&session.user_id)
        .bind(session.session_start_time)
        .bind(session.session_end_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, DirectoryError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT session_id, user_id, session_start_time, session_end_time
             FROM session_db
             WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn close_session(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        // LEAST keeps an already-dead session dead; closing never extends
        sqlx::query(
            "UPDATE session_db
             SET session_end_time = LEAST(session_end_time, $2)
             WHERE session_id = $1",
        )
        .bind(session_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
