//! Server configuration.
//!
//! Configuration is layered: built-in defaults, then an optional TOML
//! file, then environment variables with the `BACKPLANE` prefix. Nested
//! keys use `__` as the separator, so `BACKPLANE__SERVER__PORT=9090`
//! overrides `[server] port`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use backplane_auth::ProviderConfig;
use serde::Deserialize;
use url::Url;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl AppConfig {
    /// Validates the configuration, returning a human-readable message
    /// for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".into());
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "logging.level must be one of {valid_levels:?}, got '{}'",
                self.logging.level
            ));
        }
        if self.pagination.default_size == 0 {
            return Err("pagination.default_size must be at least 1".into());
        }
        if self.pagination.max_size < self.pagination.default_size {
            return Err("pagination.max_size must not be smaller than pagination.default_size".into());
        }
        if self.auth.enabled {
            if self.auth.secret.is_empty() {
                return Err("auth.secret is required when auth.enabled is true".into());
            }
            let Some(oauth) = &self.auth.oauth else {
                return Err("auth.oauth is required when auth.enabled is true".into());
            };
            oauth.validate()?;
        }
        Ok(())
    }

    /// Socket address the server binds to.
    pub fn addr(&self) -> SocketAddr {
        let ip: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.server.port)
    }

    /// Externally visible base URL, falling back to host and port.
    pub fn base_url(&self) -> String {
        match &self.server.base_url {
            Some(url) => url.clone(),
            None => format!("http://{}:{}", self.server.host, self.server.port),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Overrides the advertised base URL when the server sits behind a
    /// proxy.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit_bytes() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Entry lifetime in seconds. `None` keeps entries until the next
    /// write eviction.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

fn default_cache_enabled() -> bool {
    true
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<std::time::Duration> {
        self.ttl_secs.map(std::time::Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_page_size")]
    pub default_size: usize,
    #[serde(default = "default_max_page_size")]
    pub max_size: usize,
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    100
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_size: default_page_size(),
            max_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Issuer written into the `iss` claim of every token.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// HMAC secret for token signing. Required when auth is enabled.
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub oauth: Option<OAuthSettings>,
}

fn default_issuer() -> String {
    "backplane".to_string()
}

fn default_token_ttl_secs() -> u64 {
    86_400
}

impl AuthSettings {
    pub fn token_ttl(&self) -> time::Duration {
        time::Duration::seconds(self.token_ttl_secs as i64)
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: default_issuer(),
            secret: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
            session: SessionSettings::default(),
            oauth: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

impl SessionSettings {
    pub fn ttl(&self) -> time::Duration {
        time::Duration::seconds(self.ttl_secs as i64)
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Settings for the upstream OAuth2/OIDC provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthSettings {
    /// Provider label recorded on provisioned users (e.g. "google").
    #[serde(default = "default_provider")]
    pub provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Where the browser lands after a successful login. The issued
    /// token is appended as a `token` query parameter.
    #[serde(default = "default_success_redirect")]
    pub success_redirect: String,
}

fn default_provider() -> String {
    "oauth".to_string()
}

fn default_scope() -> String {
    "openid profile email".to_string()
}

fn default_success_redirect() -> String {
    "/".to_string()
}

impl OAuthSettings {
    fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("auth.oauth.client_id must not be empty".into());
        }
        if self.client_secret.is_empty() {
            return Err("auth.oauth.client_secret must not be empty".into());
        }
        for (field, value) in [
            ("authorize_url", &self.authorize_url),
            ("token_url", &self.token_url),
            ("userinfo_url", &self.userinfo_url),
            ("redirect_uri", &self.redirect_uri),
        ] {
            if Url::parse(value).is_err() {
                return Err(format!("auth.oauth.{field} is not a valid URL: '{value}'"));
            }
        }
        Ok(())
    }

    /// Builds the provider description the OAuth client consumes.
    pub fn provider_config(&self) -> Result<ProviderConfig, String> {
        let parse = |field: &str, value: &str| {
            Url::parse(value).map_err(|e| format!("auth.oauth.{field}: {e}"))
        };
        Ok(ProviderConfig {
            name: self.provider.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            authorize_endpoint: parse("authorize_url", &self.authorize_url)?,
            token_endpoint: parse("token_url", &self.token_url)?,
            userinfo_endpoint: parse("userinfo_url", &self.userinfo_url)?,
            redirect_uri: parse("redirect_uri", &self.redirect_uri)?,
            scopes: self.scope.split_whitespace().map(String::from).collect(),
        })
    }
}

pub mod loader {
    use std::path::Path;

    use config::{Config, Environment, File};

    use super::AppConfig;

    /// Loads configuration from an optional TOML file plus `BACKPLANE`
    /// prefixed environment variables, then validates the result.
    ///
    /// A missing file is not an error; the defaults and environment
    /// still apply.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();

        if let Some(p) = path {
            let file = Path::new(p);
            if file.exists() {
                builder = builder.add_source(File::from(file));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("BACKPLANE")
                .try_parsing(true)
                .separator("__"),
        );

        let raw = builder
            .build()
            .map_err(|e| format!("failed to read configuration: {e}"))?;
        let cfg: AppConfig = raw
            .try_deserialize()
            .map_err(|e| format!("failed to parse configuration: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
