use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::AnyPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{
        attendance::{ATTENDANCE_COLUMNS, AttendanceRecord, AttendanceStatus},
        new_id, timestamp_now, today,
    },
};

#[derive(Deserialize, Default, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClockReq {
    /// Defaults to the caller; only admins may clock someone else
    pub user_id: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRange {
    /// Inclusive lower bound, `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`
    pub end_date: Option<String>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceFilter {
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendance {
    pub user_id: String,
    #[schema(example = "2026-01-05")]
    pub date: String,
    pub status: AttendanceStatus,
}

fn validate_date(field: &str, value: &str) -> Result<(), ApiError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ApiError::BadRequest(format!("{} must be a YYYY-MM-DD date", field)))
}

async fn fetch_record(pool: &AnyPool, id: &str) -> Result<AttendanceRecord, ApiError> {
    let sql = format!("SELECT {} FROM attendance WHERE id = ?", ATTENDANCE_COLUMNS);
    sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| ApiError::internal("Error fetching attendance record", e))?
        .ok_or_else(|| ApiError::NotFound("Attendance record not found".into()))
}

/// Clock in
#[utoipa::path(
    post,
    path = "/api/attendance/clock-in",
    request_body(content = ClockReq, description = "Optional; defaults to the caller"),
    responses(
        (status = 201, description = "Clocked in successfully", body = AttendanceRecord),
        (status = 400, description = "User is already clocked in", body = Object, example = json!({
            "success": false,
            "message": "User is already clocked in",
            "error": "Bad Request"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_in(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    body: Option<web::Json<ClockReq>>,
) -> Result<HttpResponse, ApiError> {
    let user_id = body
        .and_then(|b| b.into_inner().user_id)
        .unwrap_or_else(|| auth.user_id.clone());
    auth.require_self_or_admin(&user_id)?;

    let date = today();
    let now = timestamp_now();

    let sql = format!(
        "SELECT {} FROM attendance WHERE user_id = ? AND work_date = ? ORDER BY created_at DESC",
        ATTENDANCE_COLUMNS
    );
    let todays = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(&user_id)
        .bind(&date)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error clocking in", e))?;

    if todays
        .iter()
        .any(|r| r.clock_in_time.is_some() && r.clock_out_time.is_none())
    {
        return Err(ApiError::BadRequest("User is already clocked in".into()));
    }

    // a day an admin already marked gets its clock-in filled rather than a second row
    let record_id = match todays.iter().find(|r| r.clock_in_time.is_none()) {
        Some(marked) => {
            sqlx::query(
                r#"
                UPDATE attendance
                SET clock_in_time = ?, status = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&now)
            .bind(AttendanceStatus::Present.as_ref())
            .bind(&now)
            .bind(&marked.id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| ApiError::internal("Error clocking in", e))?;
            marked.id.clone()
        }
        None => {
            let id = new_id();
            sqlx::query(
                r#"
                INSERT INTO attendance
                (id, user_id, work_date, status, clock_in_time, clock_out_time, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, NULL, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&user_id)
            .bind(&date)
            .bind(AttendanceStatus::Present.as_ref())
            .bind(&now)
            .bind(&now)
            .bind(&now)
            .execute(pool.get_ref())
            .await
            .map_err(|e| ApiError::internal("Error clocking in", e))?;
            id
        }
    };

    let attendance = fetch_record(pool.get_ref(), &record_id).await?;
    info!(user_id = %user_id, record_id = %record_id, "Clocked in");

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Clocked in successfully",
        "attendance": attendance
    })))
}

/// Clock out
#[utoipa::path(
    post,
    path = "/api/attendance/clock-out",
    request_body(content = ClockReq, description = "Optional; defaults to the caller"),
    responses(
        (status = 200, description = "Clocked out successfully", body = AttendanceRecord),
        (status = 400, description = "No active clock-in found", body = Object, example = json!({
            "success": false,
            "message": "No active clock-in found",
            "error": "Bad Request"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn clock_out(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    body: Option<web::Json<ClockReq>>,
) -> Result<HttpResponse, ApiError> {
    let user_id = body
        .and_then(|b| b.into_inner().user_id)
        .unwrap_or_else(|| auth.user_id.clone());
    auth.require_self_or_admin(&user_id)?;

    let sql = format!(
        r#"
        SELECT {} FROM attendance
        WHERE user_id = ?
        AND clock_in_time IS NOT NULL
        AND clock_out_time IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        ATTENDANCE_COLUMNS
    );
    let open = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(&user_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error clocking out", e))?
        .ok_or_else(|| ApiError::BadRequest("No active clock-in found".into()))?;

    let now = timestamp_now();
    sqlx::query("UPDATE attendance SET clock_out_time = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(&open.id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error clocking out", e))?;

    let attendance = fetch_record(pool.get_ref(), &open.id).await?;
    info!(user_id = %user_id, record_id = %open.id, "Clocked out");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Clocked out successfully",
        "attendance": attendance
    })))
}

async fn query_attendance(
    pool: &AnyPool,
    user_id: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    let mut conditions = Vec::new();
    let mut bindings: Vec<&str> = Vec::new();

    if let Some(user_id) = user_id {
        conditions.push("user_id = ?");
        bindings.push(user_id);
    }

    if let Some(start) = start_date {
        validate_date("startDate", start)?;
        conditions.push("work_date >= ?");
        bindings.push(start);
    }

    if let Some(end) = end_date {
        validate_date("endDate", end)?;
        conditions.push("work_date <= ?");
        bindings.push(end);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT {} FROM attendance {} ORDER BY work_date DESC, created_at DESC",
        ATTENDANCE_COLUMNS, where_clause
    );
    debug!(sql = %sql, bindings = ?bindings, "Fetching attendance");

    let mut data_query = sqlx::query_as::<_, AttendanceRecord>(&sql);
    for b in bindings {
        data_query = data_query.bind(b);
    }

    data_query
        .fetch_all(pool)
        .await
        .map_err(|e| ApiError::internal("Error fetching attendance records", e))
}

/// Attendance records of one user
#[utoipa::path(
    get,
    path = "/api/attendance/user/{user_id}",
    params(
        ("user_id" = String, Path, description = "Auth account id"),
        AttendanceRange
    ),
    responses(
        (status = 200, description = "Attendance records, newest day first", body = Object, example = json!({
            "success": true,
            "attendance": []
        })),
        (status = 400, description = "Malformed date"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_user_attendance(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
    query: web::Query<AttendanceRange>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(&user_id)?;

    let attendance = query_attendance(
        pool.get_ref(),
        Some(&user_id),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "attendance": attendance
    })))
}

/// Attendance across users (admin only)
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Attendance records", body = Object, example = json!({
            "success": true,
            "attendance": []
        })),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    query: web::Query<AttendanceFilter>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let attendance = query_attendance(
        pool.get_ref(),
        query.user_id.as_deref(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "attendance": attendance
    })))
}

/// Set the status of a user's day (admin only)
///
/// Updates the latest record of that day, or creates one without clock times.
#[utoipa::path(
    put,
    path = "/api/attendance/status",
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Attendance updated", body = AttendanceRecord),
        (status = 400, description = "Malformed date"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    payload: web::Json<UpdateAttendance>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    validate_date("date", &payload.date)?;

    if payload.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("userId is required".into()));
    }

    let now = timestamp_now();
    let sql = format!(
        "SELECT {} FROM attendance WHERE user_id = ? AND work_date = ? ORDER BY created_at DESC LIMIT 1",
        ATTENDANCE_COLUMNS
    );
    let existing = sqlx::query_as::<_, AttendanceRecord>(&sql)
        .bind(&payload.user_id)
        .bind(&payload.date)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error updating attendance", e))?;

    let record_id = match existing {
        Some(record) => {
            sqlx::query("UPDATE attendance SET status = ?, updated_at = ? WHERE id = ?")
                .bind(payload.status.as_ref())
                .bind(&now)
                .bind(&record.id)
                .execute(pool.get_ref())
                .await
                .map_err(|e| ApiError::internal("Error updating attendance", e))?;
            record.id
        }
        None => {
            let id = new_id();
            sqlx::query(
                r#"
                INSERT INTO attendance
                (id, user_id, work_date, status, clock_in_time, clock_out_time, created_at, updated_at)
                VALUES (?, ?, ?, ?, NULL, NULL, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&payload.user_id)
            .bind(&payload.date)
            .bind(payload.status.as_ref())
            .bind(&now)
            .bind(&now)
            .execute(pool.get_ref())
            .await
            .map_err(|e| ApiError::internal("Error updating attendance", e))?;
            id
        }
    };

    let attendance = fetch_record(pool.get_ref(), &record_id).await?;
    info!(
        admin = %auth.user_id,
        user_id = %payload.user_id,
        date = %payload.date,
        status = %payload.status,
        "Attendance updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Attendance updated",
        "attendance": attendance
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_be_calendar_days() {
        assert!(validate_date("startDate", "2026-02-28").is_ok());
        assert!(validate_date("startDate", "2026-02-30").is_err());
        assert!(validate_date("startDate", "2026-02-28T00:00:00Z").is_err());
    }
}
