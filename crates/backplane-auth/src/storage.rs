//! Storage traits for users, roles, and sessions.
//!
//! Implementations are provided by storage backends; the in-memory
//! backend lives in `backplane-db-memory`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AuthResult;
use crate::types::{Role, Session, User};

/// Storage operations for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by id. Returns `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    /// Finds a user by username.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Finds a user by email address, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Finds a user by identity provider link.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_external_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> AuthResult<Option<User>>;

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns an error if the username or email is already taken, or
    /// the storage operation fails.
    async fn create(&self, user: &User) -> AuthResult<()>;

    /// Updates an existing user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the storage
    /// operation fails.
    async fn update(&self, user: &User) -> AuthResult<()>;

    /// Deletes a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the storage
    /// operation fails.
    async fn delete(&self, id: Uuid) -> AuthResult<()>;

    /// Stamps the user's last login time.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the storage
    /// operation fails.
    async fn update_last_login(&self, id: Uuid) -> AuthResult<()>;
}

/// Storage operations for roles.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Finds a role by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_name(&self, name: &str) -> AuthResult<Option<Role>>;

    /// Creates a role.
    ///
    /// # Errors
    ///
    /// Returns an error if a role with the same name exists or the
    /// storage operation fails.
    async fn create(&self, role: &Role) -> AuthResult<()>;

    /// All known roles, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self) -> AuthResult<Vec<Role>>;
}

/// Storage operations for login sessions.
///
/// Sessions are looked up on every authenticated request, so
/// implementations should favor cheap point reads. `cleanup_expired`
/// exists for a periodic sweeper; callers must still check expiry on
/// the rows they read.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a session.
    ///
    /// # Errors
    ///
    /// Returns an error if a session with the same token id exists or
    /// the storage operation fails.
    async fn create(&self, session: &Session) -> AuthResult<()>;

    /// Finds a session by its token id (the JWT `jti` claim).
    ///
    /// Returns the row regardless of expiry; callers check
    /// [`Session::is_expired`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_token_id(&self, token_id: &str) -> AuthResult<Option<Session>>;

    /// Removes a session. Returns whether a row was actually removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_by_token_id(&self, token_id: &str) -> AuthResult<bool>;

    /// Removes every session belonging to a user. Returns the number
    /// of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_by_user(&self, user_id: Uuid) -> AuthResult<u64>;

    /// Removes expired sessions. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}

// Ensure traits are object-safe by using them as trait objects
#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(
        _users: &dyn UserStore,
        _roles: &dyn RoleStore,
        _sessions: &dyn SessionStore,
    ) {
    }
}
