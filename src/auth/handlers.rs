use actix_web::{HttpRequest, HttpResponse, http::header::AUTHORIZATION, web};
use serde_json::json;
use sqlx::AnyPool;
use tracing::{debug, error, info, instrument};

use crate::{
    api::user::{find_by_email, find_by_user_id},
    auth::{
        auth::AuthUser,
        jwt::{bearer_token, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    error::ApiError,
    model::{new_id, role::Role, timestamp_now, user::User},
    models::{LoginReqDto, LogoutReq, Session, SignupReq, TokenType},
    utils::{email_cache, email_filter},
};

const MIN_PASSWORD_LEN: usize = 6;

/// true  => e-mail AVAILABLE
/// false => e-mail TAKEN
pub async fn is_email_available(email: &str, pool: &AnyPool) -> bool {
    let email = email_filter::normalize(email);

    // filter: a miss is a definite "never registered"
    if !email_filter::might_exist(&email) {
        return true;
    }

    // cache: a hit is a definite "registered"
    if email_cache::is_taken(&email).await {
        return false;
    }

    match find_by_email(pool, &email).await {
        Ok(Some(_)) => {
            email_cache::mark_taken(&email).await;
            false
        }
        Ok(None) => true,
        Err(_) => false, // fail closed
    }
}

fn signup_problem(req: &SignupReq) -> Option<&'static str> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() || req.name.trim().is_empty() {
        return Some("Email, password and name are required");
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Some("Invalid email address");
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Some("Password must be at least 6 characters");
    }
    None
}

fn request_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
}

/// Issues an access token plus a persisted refresh token for `user`.
async fn issue_session(pool: &AnyPool, config: &Config, user: &User) -> Result<Session, ApiError> {
    let access_token = generate_access_token(
        &user.user_id,
        &user.email,
        user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| ApiError::internal("Error issuing access token", e))?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        &user.user_id,
        &user.email,
        user.role,
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| ApiError::internal("Error issuing refresh token", e))?;

    debug!(user_id = %user.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, jti, expires_at, revoked)
        VALUES (?, ?, ?, ?, 0)
        "#,
    )
    .bind(new_id())
    .bind(&user.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| ApiError::internal("Error storing refresh token", e))?;

    Ok(Session {
        access_token,
        refresh_token,
    })
}

/// Register a new employee account
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupReq,
    responses(
        (status = 201, description = "User registered successfully", body = User),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "Email already registered"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_signup",
    skip(pool, config, payload),
    fields(email = %payload.email)
)]
pub async fn signup(
    payload: web::Json<SignupReq>,
    pool: web::Data<AnyPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Signup request received");

    if let Some(problem) = signup_problem(&payload) {
        info!(problem, "Validation failed");
        return Err(ApiError::BadRequest(problem.into()));
    }

    let email = email_filter::normalize(&payload.email);
    if !is_email_available(&email, pool.get_ref()).await {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&payload.password)
        .map_err(|e| ApiError::internal("Error hashing password", e))?;

    let user = User {
        id: new_id(),
        user_id: new_id(),
        email,
        name: payload.name.trim().to_string(),
        role: Role::Employee,
        ai_tokens_remaining: config.default_ai_tokens,
        password_hash,
        created_at: timestamp_now(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO users
        (id, user_id, email, name, role, ai_tokens_remaining, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.user_id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.role.as_ref())
    .bind(user.ai_tokens_remaining)
    .bind(&user.password_hash)
    .bind(&user.created_at)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.is_unique_violation() {
                return Err(ApiError::Conflict("Email already registered".into()));
            }
        }
        return Err(ApiError::internal("Failed to register user", e));
    }

    email_filter::insert(&user.email);
    email_cache::mark_taken(&user.email).await;

    info!(user_id = %user.user_id, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User registered successfully",
        "user": user
    })))
}

/// Log in with e-mail and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Login successful", body = Object, example = json!({
            "success": true,
            "message": "Login successful",
            "user": {},
            "session": { "accessToken": "eyJ...", "refreshToken": "eyJ..." }
        })),
        (status = 400, description = "Email and password are required"),
        (status = 401, description = "Invalid email or password"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, payload),
    fields(email = %payload.email)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<AnyPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    if payload.email.trim().is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty email or password");
        return Err(ApiError::BadRequest("Email and password are required".into()));
    }

    let email = email_filter::normalize(&payload.email);
    let user = match find_by_email(pool.get_ref(), &email).await? {
        Some(user) => user,
        None => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::Unauthorized("Invalid email or password".into()));
        }
    };

    if let Err(e) = verify_password(&payload.password, &user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid email or password".into()));
    }

    let session = issue_session(pool.get_ref(), &config, &user).await?;

    info!(user_id = %user.user_id, "Login successful");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "user": user,
        "session": session
    })))
}

/// Exchange a refresh token for a new session
///
/// The presented refresh token is revoked; reusing it fails.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "New session", body = Session),
        (status = 401, description = "Invalid, expired or revoked refresh token"),
        (status = 429, description = "Too many requests")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<AnyPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let token = request_token(&req)
        .ok_or_else(|| ApiError::Unauthorized("Refresh token required".into()))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".into()))?;

    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::Unauthorized("Refresh token required".into()));
    }

    // revoking with a guard on `revoked` makes each token single-use under concurrency
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked = 1
        WHERE jti = ?
        AND revoked = 0
        "#,
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::internal("Error revoking refresh token", e))?;

    if revoked.rows_affected() == 0 {
        info!(user_id = %claims.user_id, "Refresh token unknown or already revoked");
        return Err(ApiError::Unauthorized("Invalid or expired refresh token".into()));
    }

    // role may have changed since the token was issued
    let user = find_by_user_id(pool.get_ref(), &claims.user_id)
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid or expired refresh token".into()))?;

    let session = issue_session(pool.get_ref(), &config, &user).await?;
    prune_refresh_tokens(pool.get_ref(), &user.user_id).await;
    debug!(user_id = %user.user_id, "Session rotated");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "session": session
    })))
}

/// Log out
///
/// Deletes the presented refresh token, or every refresh token of the
/// account when `allSessions` is set. Always succeeds.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body(content = LogoutReq, description = "Optional"),
    responses(
        (status = 200, description = "Logged out successfully")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[instrument(name = "auth_logout", skip_all)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<AnyPool>,
    config: web::Data<Config>,
    body: Option<web::Json<LogoutReq>>,
) -> Result<HttpResponse, ApiError> {
    let all_sessions = body
        .and_then(|b| b.into_inner().all_sessions)
        .unwrap_or(false);

    let done = HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out successfully"
    }));

    let Some(claims) = request_token(&req).and_then(|t| verify_token(t, &config.jwt_secret).ok())
    else {
        return Ok(done);
    };

    let result = if all_sessions {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(&claims.user_id)
            .execute(pool.get_ref())
            .await
    } else if claims.token_type == TokenType::Refresh {
        sqlx::query("DELETE FROM refresh_tokens WHERE jti = ?")
            .bind(&claims.jti)
            .execute(pool.get_ref())
            .await
    } else {
        return Ok(done);
    };

    match result {
        Ok(r) => info!(
            user_id = %claims.user_id,
            all_sessions,
            revoked = r.rows_affected(),
            "Logged out"
        ),
        Err(e) => error!(error = %e, "Failed to revoke refresh tokens"),
    }
    prune_refresh_tokens(pool.get_ref(), &claims.user_id).await;

    Ok(done)
}

/// Drops every expired refresh token, and the user's revoked ones.
/// Failures are logged only; a stale row never grants access.
async fn prune_refresh_tokens(pool: &AnyPool, user_id: &str) {
    let result = sqlx::query(
        r#"
        DELETE FROM refresh_tokens
        WHERE expires_at < ?
        OR (user_id = ? AND revoked = 1)
        "#,
    )
    .bind(chrono::Utc::now().timestamp())
    .bind(user_id)
    .execute(pool)
    .await;

    match result {
        Ok(r) => debug!(user_id, pruned = r.rows_affected(), "Refresh tokens pruned"),
        Err(e) => error!(error = %e, "Failed to prune refresh tokens"),
    }
}

/// The caller's own profile
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(auth: AuthUser, pool: web::Data<AnyPool>) -> Result<HttpResponse, ApiError> {
    let user = find_by_user_id(pool.get_ref(), &auth.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user
    })))
}
