//! OAuth 2.0 authorization-code client for a single identity provider.
//!
//! The server redirects browsers to the provider's authorize endpoint,
//! then exchanges the returned code for an access token and fetches the
//! user profile from the userinfo endpoint.

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::{AuthError, AuthResult};

/// Static description of one identity provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider name used in logs and error messages (e.g. "google").
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorize_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
    /// Where the provider sends the browser back to.
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
}

/// Successful token-endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Error body per RFC 6749 §5.2.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Profile claims fetched from the userinfo endpoint.
///
/// Field names vary between providers; `sub` accepts both OIDC string
/// subjects and bare numeric ids.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthUserInfo {
    #[serde(alias = "id", deserialize_with = "deserialize_subject")]
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "login")]
    pub preferred_username: Option<String>,
}

impl OAuthUserInfo {
    /// Best available handle for a provisioned account.
    #[must_use]
    pub fn display_username(&self) -> String {
        if let Some(username) = &self.preferred_username {
            return username.clone();
        }
        if let Some(email) = &self.email
            && let Some((local, _)) = email.split_once('@')
        {
            return local.to_string();
        }
        self.sub.clone()
    }
}

/// Accepts a subject that is either a string or a number.
fn deserialize_subject<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct SubjectVisitor;

    impl Visitor<'_> for SubjectVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or integer subject identifier")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(SubjectVisitor)
}

/// HTTP client for one provider's authorization-code flow.
pub struct OAuthClient {
    provider: ProviderConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    #[must_use]
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            http: reqwest::Client::new(),
        }
    }

    /// Returns the provider's name.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider.name
    }

    /// Builds the redirect target for starting a login.
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> Url {
        let mut url = self.provider.authorize_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.provider.client_id)
            .append_pair("redirect_uri", self.provider.redirect_uri.as_str())
            .append_pair("scope", &self.provider.scopes.join(" "))
            .append_pair("state", state);
        url
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGrant` when the provider rejects the code and
    /// `IdentityProvider` for transport or parse failures.
    pub async fn exchange_code(&self, code: &str) -> AuthResult<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
            ("client_id", &self.provider.client_id),
            ("client_secret", &self.provider.client_secret),
        ];

        tracing::debug!(
            provider = %self.provider.name,
            endpoint = %self.provider.token_endpoint,
            "exchanging authorization code"
        );

        let response = self
            .http
            .post(self.provider.token_endpoint.as_str())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::identity_provider(&self.provider.name, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(AuthError::invalid_grant(format!(
                    "{}: {}",
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default()
                )));
            }
            return Err(AuthError::identity_provider(
                &self.provider.name,
                format!("token endpoint returned HTTP {status}"),
            ));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| {
                AuthError::identity_provider(
                    &self.provider.name,
                    format!("failed to parse token response: {e}"),
                )
            })
    }

    /// Fetches the user profile with the provider access token.
    ///
    /// # Errors
    ///
    /// Returns `IdentityProvider` when the endpoint fails or the body
    /// cannot be parsed.
    pub async fn fetch_user(&self, access_token: &str) -> AuthResult<OAuthUserInfo> {
        let response = self
            .http
            .get(self.provider.userinfo_endpoint.as_str())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::identity_provider(&self.provider.name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::identity_provider(
                &self.provider.name,
                format!("userinfo endpoint returned HTTP {}", response.status()),
            ));
        }

        response.json::<OAuthUserInfo>().await.map_err(|e| {
            AuthError::identity_provider(
                &self.provider.name,
                format!("failed to parse userinfo response: {e}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base: &str) -> ProviderConfig {
        ProviderConfig {
            name: "google".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            authorize_endpoint: Url::parse(&format!("{base}/authorize")).unwrap(),
            token_endpoint: Url::parse(&format!("{base}/token")).unwrap(),
            userinfo_endpoint: Url::parse(&format!("{base}/userinfo")).unwrap(),
            redirect_uri: Url::parse("http://localhost:8090/api/auth/callback").unwrap(),
            scopes: vec!["openid".to_string(), "email".to_string()],
        }
    }

    #[test]
    fn test_authorize_url_carries_flow_parameters() {
        let client = OAuthClient::new(provider("https://idp.example.com"));
        let url = client.authorize_url("state-1");

        assert_eq!(url.path(), "/authorize");
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(query.contains(&("response_type".to_string(), "code".to_string())));
        assert!(query.contains(&("client_id".to_string(), "client-1".to_string())));
        assert!(query.contains(&("scope".to_string(), "openid email".to_string())));
        assert!(query.contains(&("state".to_string(), "state-1".to_string())));
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .and(body_string_contains("client_secret=secret-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-123",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(provider(&server.uri()));
        let tokens = client.exchange_code("abc").await.unwrap();
        assert_eq!(tokens.access_token, "at-123");
        assert_eq!(tokens.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn test_exchange_code_rejection_maps_to_invalid_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "code expired"
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(provider(&server.uri()));
        let err = client.exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert!(err.to_string().contains("code expired"));
    }

    #[tokio::test]
    async fn test_exchange_code_opaque_failure_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = OAuthClient::new(provider(&server.uri()));
        let err = client.exchange_code("abc").await.unwrap_err();
        assert!(matches!(err, AuthError::IdentityProvider { .. }));
    }

    #[tokio::test]
    async fn test_fetch_user_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer at-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "109432",
                "email": "Ada@Example.com",
                "name": "Ada Lovelace"
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(provider(&server.uri()));
        let info = client.fetch_user("at-123").await.unwrap();
        assert_eq!(info.sub, "109432");
        assert_eq!(info.email.as_deref(), Some("Ada@Example.com"));
        assert_eq!(info.display_username(), "Ada");
    }

    #[tokio::test]
    async fn test_fetch_user_accepts_numeric_subject_and_login_alias() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 4217,
                "login": "ada",
                "email": "ada@example.com"
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(provider(&server.uri()));
        let info = client.fetch_user("at-999").await.unwrap();
        assert_eq!(info.sub, "4217");
        assert_eq!(info.display_username(), "ada");
    }

    #[test]
    fn test_display_username_falls_back_to_subject() {
        let info = OAuthUserInfo {
            sub: "abc-1".to_string(),
            email: None,
            name: None,
            preferred_username: None,
        };
        assert_eq!(info.display_username(), "abc-1");
    }
}
