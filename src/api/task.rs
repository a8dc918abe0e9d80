use std::str::FromStr;

use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::AnyPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        new_id,
        task::{Task, TaskPriority, TaskStatus},
        timestamp_now,
    },
    utils::db_utils::{build_update_sql, execute_update},
};

/// JSON key → column for `PATCH /tasks/{id}`
const UPDATABLE_FIELDS: &[(&str, &str)] = &[
    ("title", "title"),
    ("description", "description"),
    ("dueDate", "due_date"),
    ("priority", "priority"),
    ("status", "status"),
    ("assignedTo", "assigned_to"),
];

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    #[schema(example = "Prepare Q3 report")]
    pub title: String,
    #[schema(example = "Collect numbers from every team")]
    pub description: Option<String>,
    #[schema(example = "2026-07-01")]
    pub due_date: String,
    /// `userId` of the assignee
    pub assigned_to: String,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskStatus {
    #[schema(example = "in progress")]
    pub status: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskFilter {
    /// Only tasks in this status
    pub status: Option<String>,
}

pub async fn fetch_task(pool: &AnyPool, task_id: &str) -> Result<Option<Task>, ApiError> {
    sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiError::internal("Error fetching task", e))
}

async fn require_task(pool: &AnyPool, task_id: &str) -> Result<Task, ApiError> {
    fetch_task(pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))
}

fn parse_status(raw: Option<&str>) -> Result<TaskStatus, ApiError> {
    raw.and_then(|s| TaskStatus::from_str(s).ok())
        .ok_or_else(|| ApiError::BadRequest("Invalid status provided".into()))
}

/// Create a task (admin only)
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task created successfully", body = Task),
        (status = 400, description = "Missing title, due date or assignee"),
        (status = 403, description = "Admin only"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn create_task(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    payload: web::Json<CreateTask>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let title = payload.title.trim();
    if title.is_empty() || payload.assigned_to.trim().is_empty() || payload.due_date.is_empty() {
        return Err(ApiError::BadRequest(
            "title, dueDate and assignedTo are required".into(),
        ));
    }

    let id = new_id();
    let now = timestamp_now();
    let priority = payload.priority.unwrap_or_default();
    let status = payload.status.unwrap_or(TaskStatus::Pending);

    sqlx::query(
        r#"
        INSERT INTO tasks
        (id, title, description, assigned_to, due_date, priority, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(title)
    .bind(payload.description.as_deref().unwrap_or(""))
    .bind(payload.assigned_to.trim())
    .bind(&payload.due_date)
    .bind(priority.as_ref())
    .bind(status.as_ref())
    .bind(&now)
    .bind(&now)
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::internal("Error creating task", e))?;

    let task = require_task(pool.get_ref(), &id).await?;
    info!(task_id = %id, assigned_to = %task.assigned_to, "Task created");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Task created successfully",
        "task": task
    })))
}

/// List tasks visible to the caller
///
/// Admins see every task, employees only the ones assigned to them.
#[utoipa::path(
    get,
    path = "/api/tasks",
    params(TaskFilter),
    responses(
        (status = 200, description = "Tasks", body = Object, example = json!({
            "success": true,
            "tasks": []
        })),
        (status = 400, description = "Invalid status filter")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn list_tasks(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    query: web::Query<TaskFilter>,
) -> Result<HttpResponse, ApiError> {
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if !auth.is_admin() {
        conditions.push("assigned_to = ?");
        bindings.push(auth.user_id.clone());
    }

    if let Some(status) = query.status.as_deref() {
        let status = parse_status(Some(status))?;
        conditions.push("status = ?");
        bindings.push(status.as_ref().to_string());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!("SELECT * FROM tasks {} ORDER BY created_at DESC", where_clause);
    debug!(sql = %sql, bindings = ?bindings, "Fetching tasks");

    let mut data_query = sqlx::query_as::<_, Task>(&sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }

    let tasks = data_query
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error fetching tasks", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "tasks": tasks
    })))
}

/// Get one task
#[utoipa::path(
    get,
    path = "/api/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task found", body = Task),
        (status = 403, description = "Task belongs to someone else"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn get_task(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let task = require_task(pool.get_ref(), &path.into_inner()).await?;
    auth.require_self_or_admin(&task.assigned_to)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "task": task
    })))
}

/// Tasks assigned to one user
#[utoipa::path(
    get,
    path = "/api/tasks/user/{user_id}",
    params(("user_id" = String, Path, description = "Auth account id of the assignee")),
    responses(
        (status = 200, description = "Tasks of the user", body = Object, example = json!({
            "success": true,
            "tasks": []
        })),
        (status = 403, description = "Not allowed to access another user's records")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn get_user_tasks(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(&user_id)?;

    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE assigned_to = ? ORDER BY created_at DESC",
    )
    .bind(&user_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| ApiError::internal("Error fetching tasks", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "tasks": tasks
    })))
}

/// Change a task's status
///
/// Any status may follow any other. Employees may only move their own tasks.
#[utoipa::path(
    patch,
    path = "/api/tasks/{task_id}/status",
    params(("task_id" = String, Path, description = "Task id")),
    request_body = UpdateTaskStatus,
    responses(
        (status = 200, description = "Task status updated successfully", body = Task),
        (status = 400, description = "Invalid status provided"),
        (status = 403, description = "Not the assignee"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn update_task_status(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
    body: web::Json<UpdateTaskStatus>,
) -> Result<HttpResponse, ApiError> {
    let task_id = path.into_inner();
    let status = parse_status(body.status.as_deref())?;

    let task = require_task(pool.get_ref(), &task_id).await?;
    auth.require_self_or_admin(&task.assigned_to)?;

    sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_ref())
        .bind(timestamp_now())
        .bind(&task_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error updating task status", e))?;

    let task = require_task(pool.get_ref(), &task_id).await?;
    info!(task_id = %task_id, status = %status, by = %auth.user_id, "Task status updated");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Task status updated successfully",
        "task": task
    })))
}

/// Partially update a task (admin only)
#[utoipa::path(
    patch,
    path = "/api/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Task id")),
    request_body(
        content = Object,
        description = "Any of title, description, dueDate, priority, status, assignedTo",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Task updated successfully", body = Task),
        (status = 400, description = "Unknown field or invalid value"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn update_task(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let task_id = path.into_inner();

    validate_task_patch(&body)?;

    let update = build_update_sql(
        "tasks",
        &body,
        UPDATABLE_FIELDS,
        vec![("updated_at", timestamp_now())],
        "id",
        &task_id,
    )?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(|e| ApiError::internal("Error updating task", e))?;

    if affected == 0 {
        return Err(ApiError::NotFound("Task not found".into()));
    }

    let task = require_task(pool.get_ref(), &task_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Task updated successfully",
        "task": task
    })))
}

/// Enum columns must hold a known value and required columns may not be blank.
/// Value types are checked by `build_update_sql`.
fn validate_task_patch(body: &Value) -> Result<(), ApiError> {
    let Some(obj) = body.as_object() else {
        return Ok(()); // build_update_sql reports the shape error
    };

    for (key, value) in obj {
        let Some(text) = value.as_str() else {
            continue;
        };

        let valid = match key.as_str() {
            "priority" => TaskPriority::from_str(text).is_ok(),
            "status" => TaskStatus::from_str(text).is_ok(),
            "title" | "assignedTo" | "dueDate" => !text.trim().is_empty(),
            _ => true,
        };

        if !valid {
            return Err(ApiError::BadRequest(format!("Invalid value for '{}'", key)));
        }
    }

    Ok(())
}

/// Delete a task (admin only)
#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    params(("task_id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted successfully"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Task not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tasks"
)]
pub async fn delete_task(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let task_id = path.into_inner();

    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(&task_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error deleting task", e))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("Task not found".into()));
    }

    info!(task_id = %task_id, "Task deleted");
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Task deleted successfully"
    })))
}
