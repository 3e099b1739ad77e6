//! In-memory session store.

use async_trait::async_trait;
use backplane_auth::error::{AuthError, AuthResult};
use backplane_auth::storage::SessionStore;
use backplane_auth::types::Session;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

/// Session store keyed by token id (the JWT `jti` claim).
///
/// Expired rows stay in the map until [`SessionStore::cleanup_expired`]
/// runs; per the trait contract, lookups return them as-is.
pub struct InMemorySessionStore {
    rows: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session) -> AuthResult<()> {
        match self.rows.entry(session.token_id.clone()) {
            Entry::Occupied(_) => Err(AuthError::storage(format!(
                "session '{}' already exists",
                session.token_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn find_by_token_id(&self, token_id: &str) -> AuthResult<Option<Session>> {
        Ok(self.rows.get(token_id).map(|entry| entry.value().clone()))
    }

    async fn delete_by_token_id(&self, token_id: &str) -> AuthResult<bool> {
        Ok(self.rows.remove(token_id).is_some())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let token_ids: Vec<String> = self
            .rows
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = 0;
        for token_id in token_ids {
            if self.rows.remove(&token_id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let expired: Vec<String> = self
            .rows
            .iter()
            .filter(|entry| entry.is_expired())
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = 0;
        for token_id in expired {
            if self
                .rows
                .remove_if(&token_id, |_, session| session.is_expired())
                .is_some()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
