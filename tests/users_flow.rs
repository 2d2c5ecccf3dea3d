//! End-to-end flows that need a real Postgres.
//!
//! Gated on `PONTO_TEST_DSN`; without it every test is a no-op so the suite
//! stays green on machines without a database.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use ponto::cli::globals::GlobalArgs;
use ponto::ponto::{app, hydra::HydraClient, join::ChannelJoinSink, storage};
use secrecy::SecretString;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_TOKEN: &str = "test-admin-token";

async fn test_pool() -> Option<PgPool> {
    let Ok(dsn) = std::env::var("PONTO_TEST_DSN") else {
        eprintln!("PONTO_TEST_DSN not set; skipping");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&dsn)
        .await
        .expect("connect to test database");
    storage::ensure_schema(&pool).await.expect("schema");

    Some(pool)
}

fn test_app(pool: PgPool, hydra_url: Option<&str>) -> Router {
    let mut globals = GlobalArgs::new(SecretString::from(ADMIN_TOKEN.to_string()));
    globals.hydra_admin_url = hydra_url.map(str::to_string);

    let hydra = hydra_url.map(HydraClient::new).transpose().expect("client");
    let (sink, _rx) = ChannelJoinSink::new();

    app(pool, Arc::new(globals), hydra, Arc::new(sink))
}

fn admin_request(method: &str, uri: &str, body: Option<&Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn storage_round_trip_and_idempotent_delete() {
    let Some(pool) = test_pool().await else { return };

    let username = format!("alice-{}", Uuid::new_v4());
    let data = json!({"team": "qa", "level": 3});
    let user = storage::User {
        id: Uuid::new_v4().to_string(),
        username: username.clone(),
        password: "$argon2id$fake".to_string(),
        email: "alice@example.tld".to_string(),
        phone: String::new(),
        data: data.clone(),
    };

    assert!(matches!(
        storage::create_user(&pool, &user).await.unwrap(),
        storage::CreateOutcome::Created
    ));

    // duplicate username is a conflict, not an error
    let dup = storage::User {
        id: Uuid::new_v4().to_string(),
        ..user.clone()
    };
    assert!(matches!(
        storage::create_user(&pool, &dup).await.unwrap(),
        storage::CreateOutcome::Conflict
    ));

    let found = storage::find_user(&pool, storage::UserColumn::Username, &username)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);
    assert_eq!(found.data, data);

    storage::delete_user(&pool, &user.id).await.unwrap();
    storage::delete_user(&pool, &user.id).await.unwrap();
    assert!(storage::find_user(&pool, storage::UserColumn::Id, &user.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn admin_user_crud() {
    let Some(pool) = test_pool().await else { return };
    let app = test_app(pool, None);

    let username = format!("bob-{}", Uuid::new_v4());
    let create = json!({
        "username": username,
        "password": "hunter2",
        "email": "bob@example.tld",
        "data": {"lang": "eo"},
    });

    let response = app
        .clone()
        .oneshot(admin_request("POST", "/@users", Some(&create)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["username"], json!(username));
    assert_eq!(created["data"], json!({"lang": "eo"}));
    assert!(created.get("password").is_none());
    let id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(admin_request("GET", &format!("/@users/{id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["data"], json!({"lang": "eo"}));
    assert!(detail.get("password").is_none());

    let response = app
        .clone()
        .oneshot(admin_request("GET", "/@users?limit=1000", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["id"] == json!(id)));

    let response = app
        .clone()
        .oneshot(admin_request("DELETE", &format!("/@users/{id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // idempotent
    let response = app
        .clone()
        .oneshot(admin_request("DELETE", &format!("/@users/{id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(admin_request("GET", &format!("/@users/{id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_end_to_end() {
    let Some(pool) = test_pool().await else { return };

    let hub = MockServer::start().await;
    let app = test_app(pool, Some(&hub.uri()));

    let username = format!("foobar-{}", Uuid::new_v4());
    let response = app
        .clone()
        .oneshot(admin_request(
            "POST",
            "/@users",
            Some(&json!({"username": username, "password": "foobar"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    Mock::given(method("GET"))
        .and(path("/oauth2/auth/requests/login/abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"skip": false, "subject": ""})),
        )
        .mount(&hub)
        .await;

    Mock::given(method("PUT"))
        .and(path("/oauth2/auth/requests/login/abc/accept"))
        .and(body_partial_json(json!({
            "subject": id,
            "remember": false,
            "remember_for": 3600,
            "acr": "0",
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"redirect_to": "http://hydra.tld/n"})),
        )
        .expect(1)
        .mount(&hub)
        .await;

    // challenge started, credentials required
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/@login?login_challenge=abc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let prompt = body_json(response).await;
    assert_eq!(prompt["type"], json!("login"));
    assert_eq!(prompt["challenge"], json!("abc"));

    // wrong password and unknown user answer identically
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/@login",
            &json!({"challenge": "abc", "username": username, "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({"text": "login failed"}));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/@login",
            &json!({"challenge": "abc", "username": "nobody", "password": "foobar"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await, json!({"text": "login failed"}));

    // correct credentials resolve the challenge
    let response = app
        .oneshot(json_request(
            "POST",
            "/@login",
            &json!({"challenge": "abc", "login": username, "password": "foobar", "csrf": "tok"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "http://hydra.tld/n"
    );
}

#[tokio::test]
async fn consent_claims_exclude_password_hash() {
    let Some(pool) = test_pool().await else { return };

    let hub = MockServer::start().await;
    let app = test_app(pool, Some(&hub.uri()));

    let username = format!("carol-{}", Uuid::new_v4());
    let response = app
        .clone()
        .oneshot(admin_request(
            "POST",
            "/@users",
            Some(&json!({
                "username": username,
                "password": "s3cret",
                "email": "carol@example.tld",
                "phone": "555",
                "data": {"team": "qa"},
            })),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    Mock::given(method("GET"))
        .and(path("/oauth2/auth/requests/consent/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "skip": false,
            "subject": id,
            "requested_scope": ["openid"],
        })))
        .mount(&hub)
        .await;

    Mock::given(method("PUT"))
        .and(path("/oauth2/auth/requests/consent/xyz/accept"))
        .and(body_partial_json(json!({
            "grant_scope": ["openid"],
            "session": {
                "access_token": {"username": username},
                "id_token": {
                    "username": username,
                    "email": "carol@example.tld",
                    "phone": "555",
                    "data": {"team": "qa"},
                },
            },
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"redirect_to": "http://hydra.tld/n"})),
        )
        .expect(1)
        .mount(&hub)
        .await;

    // a subject the hub does not vouch for is refused
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/@consent",
            &json!({"challenge": "xyz", "subject": "someone-else", "requested_scope": ["openid"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(json_request(
            "POST",
            "/@consent",
            &json!({"challenge": "xyz", "subject": id, "requested_scope": ["openid"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    // nothing that reached the hub contains the password hash
    for request in hub.received_requests().await.unwrap() {
        let body = String::from_utf8_lossy(&request.body).to_string();
        assert!(!body.contains("argon2"), "password hash leaked: {body}");
    }
}
