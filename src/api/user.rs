use std::str::FromStr;

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::AnyPool;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{role::Role, user::User},
    service::metering,
};

#[derive(Deserialize, ToSchema)]
pub struct UpdateRoleReq {
    #[schema(example = "admin")]
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTokensReq {
    /// New balance; `-1` grants unlimited use
    #[schema(example = 50)]
    pub tokens: i64,
}

/// List all users
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = Object, example = json!({
            "success": true,
            "users": []
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(pool: web::Data<AnyPool>) -> Result<HttpResponse, ApiError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at ASC")
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error fetching users", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "users": users
    })))
}

/// Get a user by e-mail
#[utoipa::path(
    get,
    path = "/api/users/{email}",
    params(("email" = String, Path, description = "E-mail address")),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user_by_email(
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let email = path.into_inner().trim().to_lowercase();

    let user = find_by_email(pool.get_ref(), &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": user
    })))
}

pub async fn find_by_email(pool: &AnyPool, email: &str) -> Result<Option<User>, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiError::internal("Error fetching user", e))
}

pub async fn find_by_user_id(pool: &AnyPool, user_id: &str) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiError::internal("Error fetching user", e))?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

/// Change a user's role (admin only)
#[utoipa::path(
    patch,
    path = "/api/users/{user_id}/role",
    params(("user_id" = String, Path, description = "Auth account id of the user")),
    request_body = UpdateRoleReq,
    responses(
        (status = 200, description = "User role updated successfully", body = User),
        (status = 400, description = "Invalid role provided"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user_role(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
    body: web::Json<UpdateRoleReq>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let user_id = path.into_inner();

    let role = body
        .role
        .as_deref()
        .and_then(|r| Role::from_str(r).ok())
        .ok_or_else(|| ApiError::BadRequest("Invalid role provided".into()))?;

    // 404 before touching anything
    find_by_user_id(pool.get_ref(), &user_id).await?;

    sqlx::query("UPDATE users SET role = ? WHERE user_id = ?")
        .bind(role.as_ref())
        .bind(&user_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error updating user role", e))?;

    let user = find_by_user_id(pool.get_ref(), &user_id).await?;
    info!(admin = %auth.user_id, user_id = %user_id, role = %role, "User role updated");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User role updated successfully",
        "user": user
    })))
}

/// Set a user's AI token allocation (admin only)
#[utoipa::path(
    patch,
    path = "/api/users/{user_id}/tokens",
    params(("user_id" = String, Path, description = "Auth account id of the user")),
    request_body = UpdateTokensReq,
    responses(
        (status = 200, description = "Token allocation updated", body = User),
        (status = 400, description = "Invalid amount"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user_tokens(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
    body: web::Json<UpdateTokensReq>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let user_id = path.into_inner();

    let user = metering::set_allocation(pool.get_ref(), &user_id, body.tokens).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Updated tokens for {} to {}", user.name, body.tokens),
        "user": user
    })))
}
