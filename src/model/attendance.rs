use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, any::AnyRow};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Select list for [`AttendanceRecord`]. The `Any` driver cannot decode SQL
/// NULL, so open clock times come back as `''`.
pub const ATTENDANCE_COLUMNS: &str = "id, user_id, work_date, status, \
    COALESCE(clock_in_time, '') AS clock_in_time, \
    COALESCE(clock_out_time, '') AS clock_out_time, \
    created_at, updated_at";

/// One working day of one user. Clock-in/out fill the timestamps; an admin
/// may also set the day status directly.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    #[schema(example = "2026-01-05")]
    pub date: String,
    pub status: AttendanceStatus,
    pub clock_in_time: Option<String>,
    pub clock_out_time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn clock_time(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl<'r> FromRow<'r, AnyRow> for AttendanceRecord {
    fn from_row(row: &'r AnyRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = AttendanceStatus::try_from(status).map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".into(),
            source: Box::new(e),
        })?;

        Ok(AttendanceRecord {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            date: row.try_get("work_date")?,
            status,
            clock_in_time: clock_time(row.try_get("clock_in_time")?),
            clock_out_time: clock_time(row.try_get("clock_out_time")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    #[test]
    fn blank_clock_time_means_not_clocked() {
        assert_eq!(clock_time(String::new()), None);
        assert_eq!(
            clock_time("2026-01-05T09:00:00.000000Z".into()).as_deref(),
            Some("2026-01-05T09:00:00.000000Z")
        );
    }

    #[actix_web::test]
    async fn open_shift_decodes_through_the_any_pool() {
        let pool = init_db("sqlite::memory:", 1).await.unwrap();
        sqlx::query(
            r#"
            INSERT INTO attendance
            (id, user_id, work_date, status, clock_in_time, clock_out_time, created_at, updated_at)
            VALUES ('a1', 'u1', '2026-01-05', 'half-day', '2026-01-05T09:00:00.000000Z', NULL, 't', 't')
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let sql = format!("SELECT {} FROM attendance WHERE id = ?", ATTENDANCE_COLUMNS);
        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind("a1")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(record.date, "2026-01-05");
        assert_eq!(record.status, AttendanceStatus::HalfDay);
        assert!(record.clock_in_time.is_some());
        assert_eq!(record.clock_out_time, None);
    }

    #[test]
    fn half_day_is_kebab_cased() {
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "half-day");
        assert_eq!(
            serde_json::from_str::<AttendanceStatus>("\"half-day\"").unwrap(),
            AttendanceStatus::HalfDay
        );
    }
}
