//! Login orchestration: OAuth callback handling, user provisioning,
//! session issuance, and request authentication.

use std::sync::Arc;

use dashmap::DashMap;
use time::{Duration, OffsetDateTime};
use url::Url;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::oauth::{OAuthClient, OAuthUserInfo};
use crate::storage::{RoleStore, SessionStore, UserStore};
use crate::token::{JwtService, TokenClaims};
use crate::types::{ROLE_ADMIN, ROLE_MODERATOR, ROLE_USER, Role, Session, User};

/// How long a login may sit between redirect and callback.
const LOGIN_STATE_TTL: Duration = Duration::minutes(10);

/// A login redirect that has not come back through the callback yet.
#[derive(Debug, Clone)]
struct PendingLogin {
    expires_at: OffsetDateTime,
}

/// Outcome of a completed login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub claims: TokenClaims,
    pub user: User,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: TokenClaims,
    pub user: User,
}

impl AuthContext {
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

/// Authentication service wiring stores, the token signer, and the
/// identity provider client together.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    roles: Arc<dyn RoleStore>,
    sessions: Arc<dyn SessionStore>,
    jwt: Arc<JwtService>,
    oauth: Option<Arc<OAuthClient>>,
    session_ttl: Duration,
    pending_logins: DashMap<String, PendingLogin>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        roles: Arc<dyn RoleStore>,
        sessions: Arc<dyn SessionStore>,
        jwt: Arc<JwtService>,
        oauth: Option<Arc<OAuthClient>>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            roles,
            sessions,
            jwt,
            oauth,
            session_ttl,
            pending_logins: DashMap::new(),
        }
    }

    /// Seeds the built-in roles when they are missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the role store fails.
    pub async fn ensure_default_roles(&self) -> AuthResult<()> {
        for (name, description) in [
            (ROLE_USER, "Default role for provisioned accounts"),
            (ROLE_MODERATOR, "Elevated, non-admin moderation duties"),
            (ROLE_ADMIN, "Grants access to the admin surface"),
        ] {
            if self.roles.find_by_name(name).await?.is_none() {
                self.roles
                    .create(&Role::new(name).with_description(description))
                    .await?;
            }
        }
        Ok(())
    }

    /// Starts a login: records a state nonce and returns the provider
    /// redirect URL.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when no identity provider is configured.
    pub fn login_redirect(&self) -> AuthResult<Url> {
        let oauth = self.oauth_client()?;
        let state = Uuid::new_v4().to_string();
        self.pending_logins.insert(
            state.clone(),
            PendingLogin {
                expires_at: OffsetDateTime::now_utc() + LOGIN_STATE_TTL,
            },
        );
        Ok(oauth.authorize_url(&state))
    }

    /// Completes a login from the provider callback.
    ///
    /// Consumes the state nonce, exchanges the code, provisions or
    /// refreshes the user keyed by email, and opens a session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` for unknown or stale state values and
    /// propagates exchange, userinfo, and storage failures.
    pub async fn handle_callback(&self, code: &str, state: &str) -> AuthResult<LoginOutcome> {
        self.consume_state(state)?;
        let oauth = self.oauth_client()?;

        let tokens = oauth.exchange_code(code).await?;
        let info = oauth.fetch_user(&tokens.access_token).await?;
        let user = self.upsert_user(oauth.provider_name(), info).await?;

        self.users.update_last_login(user.id).await?;
        let outcome = self.establish_session(&user).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "login completed");
        Ok(outcome)
    }

    /// Issues a token and opens the backing session for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if token encoding or session storage fails.
    pub async fn establish_session(&self, user: &User) -> AuthResult<LoginOutcome> {
        let (token, claims) = self.jwt.issue(user)?;
        let session = Session::new(claims.jti.clone(), user.id, self.session_ttl);
        self.sessions.create(&session).await?;
        Ok(LoginOutcome {
            token,
            claims,
            user: user.clone(),
        })
    }

    /// Authenticates a bearer token: verifies the JWT, checks the
    /// session registry, and loads the user.
    ///
    /// # Errors
    ///
    /// Returns 401-category errors for expired tokens, revoked or
    /// expired sessions, and vanished users; `Forbidden` for disabled
    /// accounts.
    pub async fn authenticate(&self, token: &str) -> AuthResult<AuthContext> {
        let claims = self.jwt.verify(token)?;

        let Some(session) = self.sessions.find_by_token_id(&claims.jti).await? else {
            tracing::debug!(jti = %claims.jti, "no session for token");
            return Err(AuthError::SessionRevoked);
        };
        if session.is_expired() {
            self.sessions.delete_by_token_id(&claims.jti).await?;
            return Err(AuthError::SessionExpired);
        }

        let user_id = claims.user_id()?;
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(AuthError::invalid_token("user no longer exists"));
        };
        if !user.is_active() {
            return Err(AuthError::forbidden("user account is disabled"));
        }

        Ok(AuthContext { claims, user })
    }

    /// Ends the session behind a token. Safe to call repeatedly; an
    /// expired token still ends its session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` when the signature is wrong and
    /// propagates storage failures.
    pub async fn logout(&self, token: &str) -> AuthResult<bool> {
        let claims = self.jwt.verify_allow_expired(token)?;
        let removed = self.sessions.delete_by_token_id(&claims.jti).await?;
        if removed {
            tracing::info!(jti = %claims.jti, "session ended by logout");
        }
        Ok(removed)
    }

    /// Drops expired sessions and stale login states. Returns the
    /// number of sessions removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn sweep_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        self.pending_logins.retain(|_, login| login.expires_at > now);
        self.sessions.cleanup_expired().await
    }

    /// Ends every session a user holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn revoke_user_sessions(&self, user_id: Uuid) -> AuthResult<u64> {
        self.sessions.delete_by_user(user_id).await
    }

    fn oauth_client(&self) -> AuthResult<&Arc<OAuthClient>> {
        self.oauth
            .as_ref()
            .ok_or_else(|| AuthError::configuration("no identity provider configured"))
    }

    fn consume_state(&self, state: &str) -> AuthResult<()> {
        let Some((_, login)) = self.pending_logins.remove(state) else {
            return Err(AuthError::invalid_state("unknown or replayed state"));
        };
        if login.expires_at <= OffsetDateTime::now_utc() {
            return Err(AuthError::invalid_state("login took too long, start again"));
        }
        Ok(())
    }

    /// Creates or refreshes the account for a provider profile.
    ///
    /// Accounts are keyed by email. An existing account gets its name
    /// and provider link refreshed; a new one is provisioned with the
    /// default role.
    async fn upsert_user(&self, provider: &str, info: OAuthUserInfo) -> AuthResult<User> {
        let Some(email) = info.email.as_deref().map(str::to_lowercase) else {
            return Err(AuthError::identity_provider(
                provider,
                "userinfo response carried no email",
            ));
        };

        if let Some(mut existing) = self.users.find_by_email(&email).await? {
            if !existing.is_active() {
                return Err(AuthError::forbidden("user account is disabled"));
            }
            existing.name = info.name.clone().or(existing.name);
            existing.provider = Some(provider.to_string());
            existing.provider_subject = Some(info.sub.clone());
            existing.updated_at = OffsetDateTime::now_utc();
            self.users.update(&existing).await?;
            return Ok(existing);
        }

        let username = self.available_username(info.display_username(), &email).await?;
        let mut user = User::new(username, &email).with_provider(provider, &info.sub);
        user.name = info.name.clone();
        self.users.create(&user).await?;
        tracing::info!(user_id = %user.id, email = %user.email, "provisioned new user");
        Ok(user)
    }

    /// Picks a username that is free, falling back to the email and
    /// then a suffixed variant.
    async fn available_username(&self, preferred: String, email: &str) -> AuthResult<String> {
        if self.users.find_by_username(&preferred).await?.is_none() {
            return Ok(preferred);
        }
        if self.users.find_by_username(email).await?.is_none() {
            return Ok(email.to_string());
        }
        let suffix = Uuid::new_v4().simple().to_string();
        Ok(format!("{preferred}-{}", &suffix[..8]))
    }
}
