mod common;

use actix_web::{http::StatusCode, test};
use serde_json::json;

use common::*;

#[actix_web::test]
async fn health_is_public() {
    let (app, _pool) = spawn_app().await;

    let (status, body) = send(&app, test::TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[actix_web::test]
async fn signup_creates_an_employee_with_the_default_allocation() {
    let (app, _pool) = spawn_app().await;
    let email = unique_email("Ada");

    let (status, body) = send(
        &app,
        post("/api/auth/signup").set_json(json!({
            "email": email,
            "password": PASSWORD,
            "name": "Ada Lovelace",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["user"]["email"], email.to_lowercase());
    assert_eq!(body["user"]["role"], "employee");
    assert_eq!(body["user"]["aiTokensRemaining"], 10);
    assert!(body["user"].get("passwordHash").is_none());
}

#[actix_web::test]
async fn signup_with_a_taken_email_conflicts() {
    let (app, _pool) = spawn_app().await;
    let account = register(&app, "grace").await;

    let (status, body) = send(
        &app,
        post("/api/auth/signup").set_json(json!({
            "email": account.email.to_uppercase(),
            "password": PASSWORD,
            "name": "Someone Else",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn signup_rejects_missing_fields() {
    let (app, _pool) = spawn_app().await;

    let (status, body) = send(
        &app,
        post("/api/auth/signup").set_json(json!({
            "email": unique_email("nobody"),
            "password": PASSWORD,
            "name": "  ",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email, password and name are required");
}

#[actix_web::test]
async fn login_with_a_wrong_password_is_unauthorized() {
    let (app, _pool) = spawn_app().await;
    let account = register(&app, "linus").await;

    let (status, body) = send(
        &app,
        post("/api/auth/login").set_json(json!({
            "email": account.email,
            "password": "not-the-password",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
}

#[actix_web::test]
async fn me_returns_the_caller() {
    let (app, _pool) = spawn_app().await;
    let account = register(&app, "barbara").await;

    let (status, body) = send(&app, bearer(get("/api/auth/me"), &account.access_token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["userId"], account.user_id.as_str());
    assert_eq!(body["user"]["name"], "barbara");
}

#[actix_web::test]
async fn protected_routes_require_an_access_token() {
    let (app, _pool) = spawn_app().await;
    let account = register(&app, "ken").await;

    let (status, _) = send(&app, get("/api/tasks")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a refresh token is not an access token
    let (status, body) = send(&app, bearer(get("/api/tasks"), &account.refresh_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, bearer(get("/api/tasks"), &account.access_token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn refresh_rotates_and_old_token_cannot_be_reused() {
    let (app, _pool) = spawn_app().await;
    let account = register(&app, "dennis").await;

    let (status, body) = send(
        &app,
        bearer(post("/api/auth/refresh"), &account.refresh_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = body["session"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, account.refresh_token);

    let new_access = body["session"]["accessToken"].as_str().unwrap();
    let (status, _) = send(&app, bearer(get("/api/auth/me"), new_access)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        bearer(post("/api/auth/refresh"), &account.refresh_token),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, bearer(post("/api/auth/refresh"), &rotated)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn logout_revokes_the_presented_refresh_token() {
    let (app, _pool) = spawn_app().await;
    let account = register(&app, "margaret").await;

    let (status, body) = send(
        &app,
        bearer(post("/api/auth/logout"), &account.refresh_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(
        &app,
        bearer(post("/api/auth/refresh"), &account.refresh_token),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // logging out twice is fine
    let (status, _) = send(
        &app,
        bearer(post("/api/auth/logout"), &account.refresh_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn logout_of_all_sessions_revokes_every_refresh_token() {
    let (app, _pool) = spawn_app().await;
    let first = register(&app, "frances").await;
    let second = login(&app, &first.email).await;

    let (status, _) = send(
        &app,
        bearer(post("/api/auth/logout"), &first.access_token)
            .set_json(json!({ "allSessions": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for token in [&first.refresh_token, &second.refresh_token] {
        let (status, _) = send(&app, bearer(post("/api/auth/refresh"), token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[actix_web::test]
async fn logout_without_a_token_still_succeeds() {
    let (app, _pool) = spawn_app().await;

    let (status, body) = send(&app, post("/api/auth/logout")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");
}

async fn refresh_rows(pool: &sqlx::AnyPool) -> Vec<String> {
    sqlx::query_as::<_, (String,)>("SELECT user_id FROM refresh_tokens ORDER BY user_id")
        .fetch_all(pool)
        .await
        .unwrap()
        .into_iter()
        .map(|(user_id,)| user_id)
        .collect()
}

#[actix_web::test]
async fn spent_and_expired_refresh_tokens_are_deleted() {
    let (app, pool) = spawn_app().await;
    let account = register(&app, "barbara").await;

    // a session abandoned long ago by someone else
    sqlx::query(
        "INSERT INTO refresh_tokens (id, user_id, jti, expires_at, revoked) VALUES ('r0', 'ghost', 'old-jti', 1, 0)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let (status, _) = send(
        &app,
        bearer(post("/api/auth/refresh"), &account.refresh_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refresh_rows(&pool).await, vec![account.user_id.clone()]);

    let (status, _) = send(
        &app,
        bearer(post("/api/auth/logout"), &account.access_token)
            .set_json(json!({ "allSessions": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(refresh_rows(&pool).await.is_empty());
}
