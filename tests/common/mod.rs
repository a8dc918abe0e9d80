#![allow(dead_code)]

use std::net::SocketAddr;

use actix_http::Request;
use actix_web::{
    App,
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test::{self, TestRequest},
    web,
};
use serde_json::{Value, json};
use sqlx::AnyPool;

use taskflow::{
    config::{AiConfig, Config},
    db::init_db,
    routes,
    service::ai_client::{AiClient, AiProvider},
};

pub const PASSWORD: &str = "password123";

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".into(),
        db_max_connections: 1,
        jwt_secret: "integration-test-secret".into(),
        server_addr: "127.0.0.1:0".into(),
        access_token_ttl: 900,
        refresh_token_ttl: 3600,
        rate_login_per_min: 1000,
        rate_signup_per_min: 1000,
        rate_refresh_per_min: 1000,
        rate_protected_per_min: 1000,
        api_prefix: "/api".into(),
        log_dir: "logs".into(),
        default_ai_tokens: 10,
        ai: AiConfig {
            provider: AiProvider::Mock,
            api_key: String::new(),
            model: "mock".into(),
            endpoint: None,
        },
    }
}

pub async fn spawn_app() -> (
    impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    AnyPool,
) {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(
    config: Config,
) -> (
    impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>,
    AnyPool,
) {
    let pool = init_db(&config.database_url, config.db_max_connections)
        .await
        .expect("in-memory database");

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(AiClient::new(config.ai.clone())))
            .configure(|cfg| routes::configure(cfg, config.clone())),
    )
    .await;

    (app, pool)
}

/// The rate limiter keys on the peer address, so every request needs one.
pub fn peer() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

pub fn get(uri: &str) -> TestRequest {
    TestRequest::get().uri(uri).peer_addr(peer())
}

pub fn post(uri: &str) -> TestRequest {
    TestRequest::post().uri(uri).peer_addr(peer())
}

pub fn patch(uri: &str) -> TestRequest {
    TestRequest::patch().uri(uri).peer_addr(peer())
}

pub fn put(uri: &str) -> TestRequest {
    TestRequest::put().uri(uri).peer_addr(peer())
}

pub fn delete(uri: &str) -> TestRequest {
    TestRequest::delete().uri(uri).peer_addr(peer())
}

pub fn bearer(req: TestRequest, token: &str) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {}", token)))
}

pub async fn send<S, B>(app: &S, req: TestRequest) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req.to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

pub fn unique_email(name: &str) -> String {
    format!("{}-{}@example.com", name, uuid::Uuid::new_v4())
}

#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn login<S, B>(app: &S, email: &str) -> Account
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = send(
        app,
        post("/api/auth/login").set_json(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);

    Account {
        user_id: body["user"]["userId"].as_str().unwrap().to_string(),
        email: body["user"]["email"].as_str().unwrap().to_string(),
        access_token: body["session"]["accessToken"].as_str().unwrap().to_string(),
        refresh_token: body["session"]["refreshToken"].as_str().unwrap().to_string(),
    }
}

/// Signs up a fresh employee and logs them in.
pub async fn register<S, B>(app: &S, name: &str) -> Account
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let email = unique_email(name);
    let (status, body) = send(
        app,
        post("/api/auth/signup").set_json(json!({
            "email": email,
            "password": PASSWORD,
            "name": name,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);

    login(app, &email).await
}

/// Signs up an account, promotes it in storage and logs in again so the
/// access token carries the admin role.
pub async fn register_admin<S, B>(app: &S, pool: &AnyPool, name: &str) -> Account
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let account = register(app, name).await;

    sqlx::query("UPDATE users SET role = 'admin' WHERE user_id = ?")
        .bind(&account.user_id)
        .execute(pool)
        .await
        .unwrap();

    login(app, &account.email).await
}
