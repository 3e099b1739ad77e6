//! Core auth types: users, roles, and sessions.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Role granted to every freshly provisioned user.
pub const ROLE_USER: &str = "user";

/// Role required for the admin surface.
pub const ROLE_ADMIN: &str = "admin";

/// Role for elevated, non-admin moderation duties.
pub const ROLE_MODERATOR: &str = "moderator";

/// A user account provisioned from an identity provider login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Display handle, derived from the provider profile.
    pub username: String,

    /// Lowercased email address; the upsert key for logins.
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Identity provider that vouched for this user (e.g. "google").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Subject identifier at the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_subject: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    pub active: bool,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
}

impl User {
    /// Creates an active user with a fresh id and the default role.
    #[must_use]
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into().to_lowercase(),
            name: None,
            provider: None,
            provider_subject: None,
            roles: vec![ROLE_USER.to_string()],
            active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the provider identity link.
    #[must_use]
    pub fn with_provider(
        mut self,
        provider: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        self.provider = Some(provider.into());
        self.provider_subject = Some(subject.into());
        self
    }

    /// Replaces the role set.
    #[must_use]
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    /// Sets the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN)
    }
}

/// A named role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Role {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A server-side login session, keyed by the token's `jti` claim.
///
/// A bearer token is only honored while its session row exists and has
/// not outlived the configured lifetime, so logout and eviction take
/// effect immediately even for unexpired tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The `jti` claim of the token this session backs.
    pub token_id: String,

    pub user_id: Uuid,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// Creates a session expiring `ttl` from now.
    #[must_use]
    pub fn new(token_id: impl Into<String>, user_id: Uuid, ttl: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            token_id: token_id.into(),
            user_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }

    /// Remaining lifetime, zero when already expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let left = self.expires_at - OffsetDateTime::now_utc();
        left.max(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new_defaults() {
        let user = User::new("ada", "Ada@Example.com");
        assert_eq!(user.email, "ada@example.com");
        assert!(user.active);
        assert_eq!(user.roles, vec![ROLE_USER.to_string()]);
        assert!(!user.is_admin());
        assert!(user.last_login_at.is_none());
    }

    #[test]
    fn test_user_roles() {
        let user = User::new("root", "root@example.com")
            .with_roles(vec![ROLE_USER.to_string(), ROLE_ADMIN.to_string()]);
        assert!(user.has_role(ROLE_ADMIN));
        assert!(user.is_admin());
        assert!(user.has_any_role(&["operator", ROLE_USER]));
        assert!(!user.has_any_role(&["operator", "auditor"]));
    }

    #[test]
    fn test_user_provider_link() {
        let user = User::new("ada", "ada@example.com").with_provider("google", "109432");
        assert_eq!(user.provider.as_deref(), Some("google"));
        assert_eq!(user.provider_subject.as_deref(), Some("109432"));
    }

    #[test]
    fn test_session_expiry() {
        let live = Session::new("jti-1", Uuid::new_v4(), Duration::hours(1));
        assert!(!live.is_expired());
        assert!(live.remaining() > Duration::minutes(59));

        let dead = Session::new("jti-2", Uuid::new_v4(), Duration::seconds(-1));
        assert!(dead.is_expired());
        assert_eq!(dead.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_session_serde_round_trip() {
        let session = Session::new("jti-3", Uuid::new_v4(), Duration::hours(24));
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
