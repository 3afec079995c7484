//! HTTP behaviour of the router, served from the in-memory repositories.

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        HeaderMap, Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    },
};
use chrono::Utc;
use gamegate::{
    api,
    auth::{AuthConfig, AuthFlow, MIN_HASH_COST, PasswordPolicy, TierAuthorizer},
    catalog::Catalog,
    db::{
        Game, Repositories,
        memory::{MemoryStore, Subscription},
    },
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc};
use tower::ServiceExt;
use uuid::Uuid;

const PASSWORD: &str = "Sup3r$ecret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    games_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.games_dir);
    }
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Reply {
    fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(ToString::to_string)
            .collect()
    }

    fn error(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }

    fn str_field(&self, name: &str) -> Result<String> {
        self.body
            .get(name)
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .with_context(|| format!("missing {name} in {}", self.body))
    }
}

fn game(slug: &str, name: &str, tier: &str) -> Game {
    let now = Utc::now();
    Game {
        id: Uuid::new_v4(),
        slug: slug.to_string(),
        name: name.to_string(),
        description: format!("{name} description"),
        version: "1.0.0".to_string(),
        tier_required: tier.to_string(),
        manifest_path: format!("games/{slug}/manifest.json"),
        size_bytes: 2048,
        created_at: now,
        updated_at: now,
    }
}

async fn test_app() -> Result<TestApp> {
    let store = Arc::new(MemoryStore::new());
    store.add_game(game("plate-run", "Plate Run", "free")).await;
    store.add_game(game("sky-forge", "Sky Forge", "premium")).await;

    let games_dir = std::env::temp_dir().join(format!("gamegate-api-{}", Uuid::new_v4()));
    let manifest_dir = games_dir.join("plate-run");
    std::fs::create_dir_all(&manifest_dir)?;
    std::fs::write(
        manifest_dir.join("manifest.json"),
        r#"{"version":"1.0.0","entryPoint":"index.html","assets":["a.png"],"totalSize":2048,"lastUpdated":"2024-01-01"}"#,
    )?;

    let repos = Repositories::memory(store.clone());
    let config = AuthConfig::new(SecretString::from(
        "api-test-secret-api-test-secret".to_string(),
    ))
    .with_password_policy(PasswordPolicy::new().with_hash_cost(MIN_HASH_COST));
    let flow = Arc::new(AuthFlow::new(config, &repos)?);
    let catalog = Arc::new(Catalog::new(
        repos.games.clone(),
        TierAuthorizer::new(repos.subscriptions.clone()),
        games_dir.clone(),
    ));

    Ok(TestApp {
        router: api::app(flow, catalog),
        store,
        games_dir,
    })
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Result<Reply> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    async fn register(&self, email: &str) -> Result<Reply> {
        self.send(json_request(
            Method::POST,
            "/api/users",
            &json!({"email": email, "password": PASSWORD, "confirmPassword": PASSWORD}),
        )?)
        .await
    }
}

fn json_request(method: Method, uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

fn bearer_request(method: Method, uri: &str, token: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?)
}

#[tokio::test]
async fn health_reports_database_and_request_id() -> Result<()> {
    let app = test_app().await?;
    let reply = app
        .send(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.str_field("database")?, "ok");
    assert_eq!(reply.str_field("name")?, "gamegate");
    assert!(reply.headers.contains_key("x-request-id"));
    assert!(reply.headers.contains_key("x-app"));
    Ok(())
}

#[tokio::test]
async fn register_sets_cookies_and_returns_tokens() -> Result<()> {
    let app = test_app().await?;
    let reply = app.register("player@example.com").await?;

    assert_eq!(reply.status, StatusCode::CREATED);
    let user = reply.body.get("user").context("user")?;
    assert_eq!(
        user.get("email").and_then(Value::as_str),
        Some("player@example.com")
    );
    assert!(user.get("password").is_none());
    assert!(user.get("createdDate").is_some());
    reply.str_field("token")?;
    reply.str_field("refreshToken")?;

    let cookies = reply.set_cookies();
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("token=ey") && c.contains("HttpOnly"))
    );
    assert!(
        cookies
            .iter()
            .any(|c| c.starts_with("refresh_token=ey") && c.contains("Path=/api/refresh"))
    );
    Ok(())
}

#[tokio::test]
async fn register_rejects_bad_input() -> Result<()> {
    let app = test_app().await?;

    let reply = app
        .send(json_request(
            Method::POST,
            "/api/users",
            &json!({"email": "not-an-email", "password": PASSWORD, "confirmPassword": PASSWORD}),
        )?)
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error(), Some("Invalid email format"));

    let reply = app
        .send(json_request(
            Method::POST,
            "/api/users",
            &json!({"email": "player@example.com", "password": PASSWORD, "confirmPassword": "other"}),
        )?)
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error(), Some("Passwords do not match"));

    let reply = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/users")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))?,
        )
        .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.error(), Some("Invalid request body"));

    app.register("player@example.com").await?;
    let reply = app.register("player@example.com").await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.error(), Some("Email already exists"));
    Ok(())
}

#[tokio::test]
async fn login_failure_is_uniform_and_clears_cookies() -> Result<()> {
    let app = test_app().await?;
    app.register("player@example.com").await?;

    let unknown = app
        .send(json_request(
            Method::POST,
            "/api/login",
            &json!({"email": "nobody@example.com", "password": PASSWORD}),
        )?)
        .await?;
    let wrong = app
        .send(json_request(
            Method::POST,
            "/api/login",
            &json!({"email": "player@example.com", "password": "Wr0ng$pass"}),
        )?)
        .await?;

    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body, wrong.body);
    assert_eq!(unknown.error(), Some("Invalid credentials"));
    assert!(unknown.set_cookies().iter().all(|c| c.contains("Max-Age=0")));
    Ok(())
}

#[tokio::test]
async fn login_refresh_logout_cycle() -> Result<()> {
    let app = test_app().await?;
    app.register("player@example.com").await?;

    let login = app
        .send(json_request(
            Method::POST,
            "/api/login",
            &json!({"email": "player@example.com", "password": PASSWORD}),
        )?)
        .await?;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(
        login
            .body
            .get("user")
            .and_then(|u| u.get("email"))
            .and_then(Value::as_str),
        Some("player@example.com")
    );
    assert_eq!(
        login.body.get("expiresIn").and_then(Value::as_u64),
        Some(86_400)
    );
    let refresh_token = login.str_field("refreshToken")?;
    let cookie = format!("refresh_token={refresh_token}");

    let refresh = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/refresh")
                .header(COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(refresh.status, StatusCode::OK);
    let access = refresh.str_field("token")?;
    assert!(
        refresh
            .set_cookies()
            .iter()
            .any(|c| c.starts_with(&format!("token={access}")))
    );

    let me = app
        .send(bearer_request(Method::GET, "/api/users/me", &access)?)
        .await?;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.str_field("email")?, "player@example.com");

    let logout = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/logout")
                .header(COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.str_field("message")?, "Logged out successfully");
    assert_eq!(logout.set_cookies().len(), 2);

    let after = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/refresh")
                .header(COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after.error(), Some("Session has been revoked"));
    Ok(())
}

#[tokio::test]
async fn logout_revokes_token_passed_in_body() -> Result<()> {
    let app = test_app().await?;
    let registered = app.register("player@example.com").await?;
    assert_eq!(registered.status, StatusCode::CREATED);
    let refresh_token = registered.str_field("refreshToken")?;

    // Browsers do not send the /api/refresh scoped cookie here, only the body.
    let logout = app
        .send(json_request(
            Method::POST,
            "/api/logout",
            &json!({"refreshToken": refresh_token}),
        )?)
        .await?;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.str_field("message")?, "Logged out successfully");
    assert_eq!(logout.set_cookies().len(), 2);

    let after = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/refresh")
                .header(COOKIE, format!("refresh_token={refresh_token}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after.error(), Some("Session has been revoked"));
    Ok(())
}

#[tokio::test]
async fn logout_without_token_still_clears_cookies() -> Result<()> {
    let app = test_app().await?;
    let logout = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/logout")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.set_cookies().len(), 2);
    Ok(())
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() -> Result<()> {
    let app = test_app().await?;
    let reply = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/refresh")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.error(), Some("Refresh token required"));
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_token() -> Result<()> {
    let app = test_app().await?;

    let reply = app
        .send(Request::builder().uri("/api/users/me").body(Body::empty())?)
        .await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.error(), Some("Missing token"));

    let reply = app
        .send(bearer_request(Method::GET, "/api/users/me", "garbage")?)
        .await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.error(), Some("Invalid token"));
    Ok(())
}

#[tokio::test]
async fn access_cookie_authenticates() -> Result<()> {
    let app = test_app().await?;
    let registered = app.register("player@example.com").await?;
    let token = registered.str_field("token")?;

    let reply = app
        .send(
            Request::builder()
                .uri("/api/users/me")
                .header(COOKIE, format!("theme=dark; token={token}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn users_only_reach_their_own_profile() -> Result<()> {
    let app = test_app().await?;
    let alice = app.register("alice@example.com").await?;
    let bob = app.register("bob@example.com").await?;
    let alice_token = alice.str_field("token")?;
    let bob_id = bob
        .body
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(Value::as_str)
        .context("bob id")?
        .to_string();

    let reply = app
        .send(bearer_request(
            Method::GET,
            &format!("/api/users/{bob_id}"),
            &alice_token,
        )?)
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .send(bearer_request(
            Method::DELETE,
            &format!("/api/users/{bob_id}"),
            &alice_token,
        )?)
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .send(bearer_request(
            Method::GET,
            "/api/users/not-a-uuid",
            &alice_token,
        )?)
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn update_and_delete_own_account() -> Result<()> {
    let app = test_app().await?;
    let registered = app.register("player@example.com").await?;
    let token = registered.str_field("token")?;
    let id = registered
        .body
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(Value::as_str)
        .context("user id")?
        .to_string();

    let update = app
        .send(
            Request::builder()
                .method(Method::PUT)
                .uri(format!("/api/users/{id}"))
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"email": "renamed@example.com"}).to_string(),
                ))?,
        )
        .await?;
    assert_eq!(update.status, StatusCode::OK);
    assert_eq!(update.str_field("email")?, "renamed@example.com");

    let delete = app
        .send(bearer_request(
            Method::DELETE,
            &format!("/api/users/{id}"),
            &token,
        )?)
        .await?;
    assert_eq!(delete.status, StatusCode::OK);
    assert_eq!(delete.str_field("message")?, "User deleted");

    let user_id = Uuid::parse_str(&id)?;
    assert_eq!(app.store.is_deleted(user_id).await, Some(true));
    assert!(
        app.store
            .sessions_for(user_id)
            .await
            .iter()
            .all(|s| s.revoked)
    );

    let me = app
        .send(bearer_request(Method::GET, "/api/users/me", &token)?)
        .await?;
    assert_eq!(me.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn games_are_filtered_by_tier() -> Result<()> {
    let app = test_app().await?;

    let anonymous = app
        .send(Request::builder().uri("/api/games").body(Body::empty())?)
        .await?;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert_eq!(anonymous.str_field("userTier")?, "free");
    assert_eq!(
        anonymous.body.get("isAuthenticated").and_then(Value::as_bool),
        Some(false)
    );
    let slugs: Vec<&str> = anonymous
        .body
        .get("games")
        .and_then(Value::as_array)
        .context("games")?
        .iter()
        .filter_map(|g| g.get("slug").and_then(Value::as_str))
        .collect();
    assert_eq!(slugs, vec!["plate-run"]);

    let registered = app.register("player@example.com").await?;
    let token = registered.str_field("token")?;
    let user_id = registered
        .body
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(Value::as_str)
        .context("user id")
        .and_then(|id| Ok(Uuid::parse_str(id)?))?;
    app.store
        .add_subscription(Subscription {
            user_id,
            tier: "premium".to_string(),
            status: "active".to_string(),
            end_date: None,
        })
        .await;

    let premium = app
        .send(bearer_request(Method::GET, "/api/games", &token)?)
        .await?;
    assert_eq!(premium.str_field("userTier")?, "premium");
    assert_eq!(
        premium.body.get("isAuthenticated").and_then(Value::as_bool),
        Some(true)
    );
    assert_eq!(
        premium
            .body
            .get("games")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(2)
    );
    Ok(())
}

#[tokio::test]
async fn manifests_respect_tier_and_slug() -> Result<()> {
    let app = test_app().await?;

    let reply = app
        .send(
            Request::builder()
                .uri("/api/games/plate-run/manifest")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.str_field("entryPoint")?, "index.html");

    let reply = app
        .send(
            Request::builder()
                .uri("/api/games/sky-forge/manifest")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.error(), Some("Subscription tier required: premium"));

    let reply = app
        .send(
            Request::builder()
                .uri("/api/games/Not_A_Slug/manifest")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.error(), Some("Game not found"));
    Ok(())
}
