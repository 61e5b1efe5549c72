//! HTTP contract of `/api/v1/auth`, exercised with `warp::test`.

use cadence::api;
use cadence::application_impl::*;
use cadence::infra_memory::*;
use cadence::server::Server;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;
use warp::http::StatusCode;

fn server() -> Arc<Server> {
    let codec = Arc::new(JwtHs256Codec::new(JwtConfig {
        issuer: "cadence.api".to_string(),
        audience: "cadence-client".to_string(),
        access_ttl: Duration::from_secs(3600),
        refresh_ttl: Duration::from_secs(86_400),
        access_key: b"api-access".to_vec(),
        refresh_key: b"api-refresh".to_vec(),
    }));
    let hasher = Arc::new(Argon2PasswordHasher::with_params(
        argon2::Params::new(8, 1, 1, None).unwrap(),
    ));
    Arc::new(Server::from_parts(
        Arc::new(MemoryUserRepo::new()),
        hasher,
        codec,
        Arc::new(MemoryTokenStore::new()),
        None,
    ))
}

fn app(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    warp::path("api")
        .and(warp::path("v1"))
        .and(api::v1::routes(server))
        .recover(api::v1::recover_error)
}

async fn post(server: &Arc<Server>, path: &str, body: Value) -> (StatusCode, Value) {
    let res = warp::test::request()
        .method("POST")
        .path(path)
        .json(&body)
        .reply(&app(server.clone()))
        .await;
    let value = serde_json::from_slice(res.body()).unwrap_or(Value::Null);
    (res.status(), value)
}

fn credentials(email: &str, password: &str) -> Value {
    json!({ "email": email, "password": password })
}

#[tokio::test]
async fn sign_up_returns_tokens_and_user_id() {
    let server = server();
    let (status, body) = post(
        &server,
        "/api/v1/auth/signUp",
        credentials("a@x.com", "password123"),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["accessToken"].is_string());
    assert!(body["refreshToken"].is_string());
    assert_eq!(body["expiresIn"], 3600);
    assert!(body["userId"].is_string());
}

#[tokio::test]
async fn second_sign_up_reports_email_exists() {
    let server = server();
    post(&server, "/api/v1/auth/signUp", credentials("a@x.com", "password123")).await;
    let (status, body) = post(
        &server,
        "/api/v1/auth/signUp",
        credentials("a@x.com", "password123"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": { "message": "EMAIL_EXISTS", "code": 400 } }));
}

#[tokio::test]
async fn sign_in_error_codes() {
    let server = server();
    post(&server, "/api/v1/auth/signUp", credentials("a@x.com", "password123")).await;

    let (status, body) = post(
        &server,
        "/api/v1/auth/signInWithPassword",
        credentials("b@x.com", "password123"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "EMAIL_NOT_FOUND");

    let (status, body) = post(
        &server,
        "/api/v1/auth/signInWithPassword",
        credentials("a@x.com", "nope"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "INVALID_PASSWORD");

    let (status, body) = post(
        &server,
        "/api/v1/auth/signInWithPassword",
        credentials("a@x.com", "password123"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["refreshToken"].is_string());
}

#[tokio::test]
async fn token_endpoint_rotates_and_rejects_replay() {
    let server = server();
    let (_, signed_up) = post(
        &server,
        "/api/v1/auth/signUp",
        credentials("a@x.com", "password123"),
    )
    .await;
    let r1 = signed_up["refreshToken"].clone();

    let (status, rotated) = post(&server, "/api/v1/auth/token", json!({ "refresh_token": r1 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rotated["userId"], signed_up["userId"]);
    assert_ne!(rotated["refreshToken"], r1);

    let (status, body) = post(&server, "/api/v1/auth/token", json!({ "refresh_token": r1 })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Unauthorized" }));

    let (status, body) = post(
        &server,
        "/api/v1/auth/token",
        json!({ "refresh_token": "not-a-token" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Unauthorized" }));
}

#[tokio::test]
async fn token_endpoint_without_a_token_is_unauthorized() {
    let server = server();

    let (status, body) = post(&server, "/api/v1/auth/token", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Unauthorized" }));

    let (status, body) = post(
        &server,
        "/api/v1/auth/token",
        json!({ "refresh_token": null }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Unauthorized" }));
}

#[tokio::test]
async fn malformed_body_is_invalid_data() {
    let server = server();
    let (status, body) = post(&server, "/api/v1/auth/signUp", json!({ "email": 42 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "INVALID_DATA");
}

#[tokio::test]
async fn me_requires_a_valid_access_token() {
    let server = server();
    let (_, signed_up) = post(
        &server,
        "/api/v1/auth/signUp",
        credentials("a@x.com", "password123"),
    )
    .await;
    let access = signed_up["accessToken"].as_str().unwrap().to_string();
    let refresh = signed_up["refreshToken"].as_str().unwrap().to_string();

    let res = warp::test::request()
        .path("/api/v1/auth/me")
        .header("authorization", format!("Bearer {access}"))
        .reply(&app(server.clone()))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["userId"], signed_up["userId"]);

    let res = warp::test::request()
        .path("/api/v1/auth/me")
        .header("authorization", format!("Bearer {refresh}"))
        .reply(&app(server.clone()))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = warp::test::request()
        .path("/api/v1/auth/me")
        .reply(&app(server.clone()))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
