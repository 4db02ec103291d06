//! In-memory session registry.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use dev_sessions_core::{
    Session, SessionStatus, SessionStore, StoreError, to_remote_name,
};

use crate::now_millis;

/// In-memory registry implementation.
///
/// Useful for development and tests. Data is lost on restart, so the
/// durable backend is the one deployed behind the gateway.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create(
        &self,
        id: &str,
        description: &str,
        creator: &str,
        workspace_path: &str,
    ) -> Result<Session, StoreError> {
        let now = now_millis();
        let remote_name = to_remote_name(id);

        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        if sessions.contains_key(id) || sessions.values().any(|s| s.remote_name == remote_name) {
            return Err(StoreError::DuplicateKey(id.to_string()));
        }

        let session = Session {
            id: id.to_string(),
            remote_name,
            description: description.to_string(),
            creator: creator.to_string(),
            workspace_path: workspace_path.to_string(),
            created_at: now,
            last_used: now,
            status: SessionStatus::Active,
        };
        sessions.insert(id.to_string(), session.clone());

        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self
            .sessions
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .get(id)
            .cloned())
    }

    async fn list(&self, status: Option<SessionStatus>) -> Result<Vec<Session>, StoreError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        let mut result: Vec<Session> = sessions
            .values()
            .filter(|s| status.is_none_or(|wanted| s.status == wanted))
            .cloned()
            .collect();

        result.sort_by(|a, b| b.last_used.cmp(&a.last_used));

        Ok(result)
    }

    async fn touch(&self, id: &str) -> Result<(), StoreError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        if let Some(session) = sessions.get_mut(id) {
            session.last_used = now_millis();
        }

        Ok(())
    }

    async fn set_status(&self, id: &str, status: SessionStatus) -> Result<(), StoreError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        if let Some(session) = sessions.get_mut(id) {
            session.status = status;
            session.last_used = now_millis();
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.sessions
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?
            .remove(id);

        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_sets_active_and_derives_remote_name() {
        let store = MemoryStore::new();
        let session = store
            .create("riven-jg", "handoff", "alice", "/home/alice/proj")
            .await
            .expect("create");

        assert_eq!(session.remote_name, "dev-riven-jg");
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.created_at, session.last_used);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = MemoryStore::new();
        store
            .create("riven-jg", "a", "alice", "/a")
            .await
            .expect("first create");

        let err = store.create("riven-jg", "b", "bob", "/b").await;
        assert!(matches!(err, Err(StoreError::DuplicateKey(_))));
    }

    #[tokio::test]
    async fn list_orders_by_last_used_descending() {
        let store = MemoryStore::new();
        store.create("one-top", "", "a", "/a").await.expect("create");
        store.create("two-mid", "", "a", "/a").await.expect("create");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.touch("one-top").await.expect("touch");

        let listed = store.list(None).await.expect("list");
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["one-top", "two-mid"]);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_touch_ignores_missing() {
        let store = MemoryStore::new();
        store.delete("ghost-sup").await.expect("delete absent");
        store.touch("ghost-sup").await.expect("touch absent");
    }
}
