use backplane_server::config::OAuthSettings;
use backplane_server::{AppConfig, AppState, build_app};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Stands up a fake identity provider answering the token and userinfo
/// endpoints for one test user.
async fn start_idp() -> MockServer {
    let idp = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "provider-access-token",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .mount(&idp)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "idp-subject-1",
            "email": "dev@example.com",
            "name": "Dev Example",
            "preferred_username": "dev",
        })))
        .mount(&idp)
        .await;

    idp
}

fn auth_config(idp_base: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.enabled = true;
    config.auth.secret = "0123456789abcdef0123456789abcdef".to_string();
    config.auth.oauth = Some(OAuthSettings {
        provider: "google".to_string(),
        client_id: "client-1".to_string(),
        client_secret: "secret-1".to_string(),
        authorize_url: format!("{idp_base}/authorize"),
        token_url: format!("{idp_base}/token"),
        userinfo_url: format!("{idp_base}/userinfo"),
        redirect_uri: "http://localhost:8080/api/auth/callback".to_string(),
        scope: "openid profile email".to_string(),
        success_redirect: "/".to_string(),
    });
    config
}

async fn start_server(
    config: AppConfig,
) -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let state = AppState::from_config(config).await.expect("build state");
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

/// Client that surfaces redirects instead of following them.
fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// Walks the whole login flow and returns the issued API token.
async fn login(client: &reqwest::Client, base: &str) -> String {
    let resp = client
        .get(format!("{base}/api/auth/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
    let authorize = url::Url::parse(&location(&resp)).unwrap();
    let state = authorize
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .expect("state parameter");

    let resp = client
        .get(format!(
            "{base}/api/auth/callback?code=test-code&state={state}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
    let target = location(&resp);
    let (_, token) = target.split_once("token=").expect("token in redirect");
    token.to_string()
}

#[tokio::test]
async fn full_login_flow_grants_and_revokes_access() {
    let idp = start_idp().await;
    let (base, shutdown_tx, handle) = start_server(auth_config(&idp.uri())).await;
    let client = no_redirect_client();
    let modules = format!("{base}/api/v1/administration-modules");

    // Data endpoints are closed without a token
    let resp = client.get(&modules).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    // The login redirect points at the provider and carries the flow parameters
    let resp = client
        .get(format!("{base}/api/auth/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
    let authorize = location(&resp);
    assert!(authorize.starts_with(&format!("{}/authorize", idp.uri())));
    assert!(authorize.contains("client_id=client-1"));
    assert!(authorize.contains("state="));

    let token = login(&client, &base).await;

    // The token opens the data endpoints
    let resp = client
        .get(&modules)
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    // The principal reflects the provider's userinfo
    let resp = client
        .get(format!("{base}/api/user/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["username"], "dev");
    assert_eq!(me["email"], "dev@example.com");
    assert_eq!(me["roles"], json!(["user"]));

    // Provisioned users are not administrators
    let resp = client
        .get(format!("{base}/api/user/admin"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);

    // Logout revokes the session behind the token
    let resp = client
        .post(format!("{base}/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

    let resp = client
        .get(format!("{base}/api/user/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    // Logging out twice is harmless
    let resp = client
        .post(format!("{base}/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn repeated_logins_reuse_the_provisioned_user() {
    let idp = start_idp().await;
    let (base, shutdown_tx, handle) = start_server(auth_config(&idp.uri())).await;
    let client = no_redirect_client();

    let first_token = login(&client, &base).await;
    let second_token = login(&client, &base).await;

    let mut ids = Vec::new();
    for token in [first_token, second_token] {
        let resp = client
            .get(format!("{base}/api/user/me"))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success());
        let me: Value = resp.json().await.unwrap();
        ids.push(me["id"].as_str().unwrap().to_string());
    }
    assert_eq!(ids[0], ids[1]);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn callback_rejects_unknown_and_replayed_states() {
    let idp = start_idp().await;
    let (base, shutdown_tx, handle) = start_server(auth_config(&idp.uri())).await;
    let client = no_redirect_client();

    // A state the server never issued
    let resp = client
        .get(format!(
            "{base}/api/auth/callback?code=test-code&state=forged"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    // A state cannot be redeemed twice
    let resp = client
        .get(format!("{base}/api/auth/login"))
        .send()
        .await
        .unwrap();
    let authorize = url::Url::parse(&location(&resp)).unwrap();
    let state = authorize
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .unwrap();

    let resp = client
        .get(format!(
            "{base}/api/auth/callback?code=test-code&state={state}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);

    let resp = client
        .get(format!(
            "{base}/api/auth/callback?code=test-code&state={state}"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn tampered_tokens_are_rejected() {
    let idp = start_idp().await;
    let (base, shutdown_tx, handle) = start_server(auth_config(&idp.uri())).await;
    let client = no_redirect_client();

    let token = login(&client, &base).await;
    let mut tampered = token.clone();
    tampered.truncate(token.len() - 2);

    let resp = client
        .get(format!("{base}/api/user/me"))
        .bearer_auth(&tampered)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn disabled_auth_leaves_data_open_and_identity_closed() {
    let (base, shutdown_tx, handle) = start_server(AppConfig::default()).await;
    let client = no_redirect_client();

    // Data endpoints answer without a token
    let resp = client
        .get(format!("{base}/api/v1/administration-modules"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    // The login flow reports that auth is off
    let resp = client
        .get(format!("{base}/api/auth/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "auth_disabled");

    let resp = client
        .post(format!("{base}/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    // Identity endpoints still require a principal
    let resp = client
        .get(format!("{base}/api/user/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
