use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DirectoryError, DirectoryStore, Identity, Session};

/// In-memory directory store. Backs the test suite and the database-less
/// development mode; state does not survive a restart.
#[derive(Default)]
pub struct MemoryDirectoryStore {
    users: RwLock<HashMap<String, Identity>>,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl MemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an identity directly, bypassing the registration flow.
    pub async fn seed_identity(&self, identity: Identity) {
        self.users
            .write()
            .await
            .insert(identity.user_id.clone(), identity);
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn find_contacts_by_roles(
        &self,
        roles: &[String],
        branch: Option<&str>,
    ) -> Result<Vec<String>, DirectoryError> {
        let users = self.users.read().await;
        let contacts = users
            .values()
            .filter(|u| roles.iter().any(|r| u.role.eq_ignore_ascii_case(r)))
            .filter(|u| match branch {
                Some(b) => u.branch.eq_ignore_ascii_case(b),
                None => true,
            })
            .filter_map(|u| u.mail.clone())
            .collect();
        Ok(contacts)
    }

    async fn find_user_by_id_and_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Identity>, DirectoryError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .filter(|u| u.device_unique_id == device_id)
            .cloned())
    }

    async fn next_sequence(&self, prefix: &str) -> Result<u32, DirectoryError> {
        let users = self.users.read().await;
        let max = users
            .keys()
            .filter(|id| id.starts_with(prefix))
            .filter_map(|id| id.get(id.len().saturating_sub(3)..)?.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<(), DirectoryError> {
        let mut users = self.users.write().await;
        if users.contains_key(&identity.user_id) {
            return Err(DirectoryError::Conflict(format!(
                "user id already registered: {}",
                identity.user_id
            )));
        }
        if users
            .values()
            .any(|u| u.device_unique_id == identity.device_unique_id)
        {
            return Err(DirectoryError::Conflict(format!(
                "device already registered: {}",
                identity.device_unique_id
            )));
        }
        users.insert(identity.user_id.clone(), identity.clone());
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), DirectoryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.session_id) {
            return Err(DirectoryError::Conflict(format!(
                "session already exists: {}",
                session.session_id
            )));
        }
        sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, DirectoryError> {
        Ok(self.sessions.read().await.get(&session_id).cloned())
    }

    async fn close_session(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), DirectoryError> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&session_id) {
            // Closing never extends an already-dead session
            session.session_end_time = session.session_end_time.min(at);
        }
        Ok(())
    }
}
