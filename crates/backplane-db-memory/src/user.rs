//! In-memory user store.

use std::sync::Arc;

use async_trait::async_trait;
use backplane_auth::error::{AuthError, AuthResult};
use backplane_auth::storage::UserStore;
use backplane_auth::types::User;
use papaya::{Compute, HashMap as PapayaHashMap, Operation};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lock-free user store.
///
/// Rows live in a papaya map keyed by id. Two index maps keep usernames
/// unique as given and emails unique case-insensitively; writers claim
/// index entries before touching the row so concurrent provisioning of
/// the same identity cannot both win.
pub struct InMemoryUserStore {
    rows: Arc<PapayaHashMap<Uuid, User>>,
    usernames: Arc<PapayaHashMap<String, Uuid>>,
    emails: Arc<PapayaHashMap<String, Uuid>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(PapayaHashMap::new()),
            usernames: Arc::new(PapayaHashMap::new()),
            emails: Arc::new(PapayaHashMap::new()),
        }
    }

    fn email_key(email: &str) -> String {
        email.to_lowercase()
    }

    /// Claims an index entry for `owner`. Fails when another id holds it.
    fn claim(index: &PapayaHashMap<String, Uuid>, key: String, owner: Uuid) -> bool {
        let guard = index.pin();
        let claim = guard.compute(key, |entry| match entry {
            None => Operation::Insert(owner),
            Some((_, held_by)) if *held_by == owner => Operation::Abort(true),
            Some(_) => Operation::Abort(false),
        });
        !matches!(claim, Compute::Aborted(false))
    }

    /// Drops an index entry, but only while it still points at `owner`.
    fn release(index: &PapayaHashMap<String, Uuid>, key: &str, owner: Uuid) {
        let guard = index.pin();
        guard.compute(key.to_string(), |entry| match entry {
            Some((_, held_by)) if *held_by == owner => Operation::Remove,
            _ => Operation::Abort(()),
        });
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let rows = self.rows.pin();
        Ok(rows.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let usernames = self.usernames.pin();
        let Some(id) = usernames.get(username) else {
            return Ok(None);
        };
        let rows = self.rows.pin();
        Ok(rows.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let emails = self.emails.pin();
        let Some(id) = emails.get(&Self::email_key(email)) else {
            return Ok(None);
        };
        let rows = self.rows.pin();
        Ok(rows.get(id).cloned())
    }

    async fn find_by_external_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> AuthResult<Option<User>> {
        let rows = self.rows.pin();
        Ok(rows
            .iter()
            .map(|(_, user)| user)
            .find(|user| {
                user.provider.as_deref() == Some(provider)
                    && user.provider_subject.as_deref() == Some(subject)
            })
            .cloned())
    }

    async fn create(&self, user: &User) -> AuthResult<()> {
        if !Self::claim(&self.usernames, user.username.clone(), user.id) {
            return Err(AuthError::storage(format!(
                "username '{}' is already taken",
                user.username
            )));
        }
        let email_key = Self::email_key(&user.email);
        if !Self::claim(&self.emails, email_key.clone(), user.id) {
            Self::release(&self.usernames, &user.username, user.id);
            return Err(AuthError::storage(format!(
                "email '{email_key}' is already registered"
            )));
        }
        let rows = self.rows.pin();
        rows.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let (old_username, old_email_key) = {
            let rows = self.rows.pin();
            let Some(stored) = rows.get(&user.id) else {
                return Err(AuthError::storage("user does not exist"));
            };
            (stored.username.clone(), Self::email_key(&stored.email))
        };

        let username_changed = user.username != old_username;
        let new_email_key = Self::email_key(&user.email);
        let email_changed = new_email_key != old_email_key;

        if username_changed && !Self::claim(&self.usernames, user.username.clone(), user.id) {
            return Err(AuthError::storage(format!(
                "username '{}' is already taken",
                user.username
            )));
        }
        if email_changed && !Self::claim(&self.emails, new_email_key.clone(), user.id) {
            if username_changed {
                Self::release(&self.usernames, &user.username, user.id);
            }
            return Err(AuthError::storage(format!(
                "email '{new_email_key}' is already registered"
            )));
        }

        let rows = self.rows.pin();
        rows.insert(user.id, user.clone());
        if username_changed {
            Self::release(&self.usernames, &old_username, user.id);
        }
        if email_changed {
            Self::release(&self.emails, &old_email_key, user.id);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AuthResult<()> {
        let removed = {
            let rows = self.rows.pin();
            rows.remove(&id).cloned()
        };
        let Some(user) = removed else {
            return Err(AuthError::storage("user does not exist"));
        };
        Self::release(&self.usernames, &user.username, id);
        Self::release(&self.emails, &Self::email_key(&user.email), id);
        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> AuthResult<()> {
        let rows = self.rows.pin();
        let outcome = rows.compute(id, |entry| match entry {
            Some((_, user)) => {
                let mut next = user.clone();
                next.last_login_at = Some(OffsetDateTime::now_utc());
                Operation::Insert(next)
            }
            None => Operation::Abort(()),
        });
        match outcome {
            Compute::Aborted(()) => Err(AuthError::storage("user does not exist")),
            _ => Ok(()),
        }
    }
}
