//! Shared application state handed to every handler.

use std::sync::Arc;

use backplane_auth::{AuthService, JwtService, OAuthClient};
use backplane_db_memory::{
    InMemoryRoleStore, InMemorySessionStore, InMemoryUserStore, create_calculation_store,
    create_module_store,
};

use crate::cache::CacheBackend;
use crate::config::AppConfig;
use crate::services::{CalculatorService, ModuleService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub modules: Arc<ModuleService>,
    pub calculator: Arc<CalculatorService>,
    /// Present only when `auth.enabled` is set.
    pub auth: Option<AuthComponents>,
}

#[derive(Clone)]
pub struct AuthComponents {
    pub service: Arc<AuthService>,
    /// Browser target after a completed login.
    pub success_redirect: String,
}

impl AppState {
    /// Wires stores, caches and services from the configuration. Seeds
    /// the default roles when auth is enabled.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let backend = CacheBackend::from_config(&config.cache);
        let modules = Arc::new(ModuleService::new(create_module_store(), backend.clone()));
        let calculator = Arc::new(CalculatorService::new(create_calculation_store(), backend));

        let auth = if config.auth.enabled {
            Some(Self::build_auth(&config).await?)
        } else {
            None
        };

        Ok(Self {
            config: Arc::new(config),
            modules,
            calculator,
            auth,
        })
    }

    async fn build_auth(config: &AppConfig) -> anyhow::Result<AuthComponents> {
        let settings = &config.auth;
        let oauth_settings = settings
            .oauth
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("auth.oauth is required when auth.enabled is true"))?;
        let provider = oauth_settings
            .provider_config()
            .map_err(|e| anyhow::anyhow!(e))?;

        let jwt = Arc::new(JwtService::from_secret(
            &settings.secret,
            &settings.issuer,
            settings.token_ttl(),
        ));
        let oauth = Arc::new(OAuthClient::new(provider));

        let service = Arc::new(AuthService::new(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryRoleStore::new()),
            Arc::new(InMemorySessionStore::new()),
            jwt,
            Some(oauth),
            settings.session.ttl(),
        ));
        service.ensure_default_roles().await?;

        Ok(AuthComponents {
            service,
            success_redirect: oauth_settings.success_redirect.clone(),
        })
    }
}
