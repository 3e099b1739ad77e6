//! # backplane-auth
//!
//! Authentication for the backplane server.
//!
//! This crate provides:
//! - OAuth 2.0 authorization-code login against an external identity provider
//! - JWT issuance and verification for API access
//! - A server-side session registry so tokens can be revoked by logout
//! - Axum middleware and extractors for protected routes
//!
//! ## Modules
//!
//! - [`error`] - Error type shared across the auth surface
//! - [`middleware`] - HTTP middleware and the [`CurrentUser`] extractor
//! - [`oauth`] - Identity provider client (redirect, code exchange, userinfo)
//! - [`service`] - Login orchestration and request authentication
//! - [`storage`] - Storage traits for users, roles, and sessions
//! - [`token`] - JWT claims and signing
//! - [`types`] - User, role, and session records

pub mod error;
pub mod middleware;
pub mod oauth;
pub mod service;
pub mod storage;
pub mod token;
pub mod types;

pub use error::{AuthError, AuthResult};
pub use middleware::{AuthState, CurrentUser, bearer_token, require_auth};
pub use oauth::{OAuthClient, OAuthUserInfo, ProviderConfig, TokenResponse};
pub use service::{AuthContext, AuthService, LoginOutcome};
pub use storage::{RoleStore, SessionStore, UserStore};
pub use token::{JwtService, TokenClaims};
pub use types::{ROLE_ADMIN, ROLE_MODERATOR, ROLE_USER, Role, Session, User};
