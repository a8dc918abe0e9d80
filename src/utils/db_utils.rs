use serde_json::Value;
use sqlx::AnyPool;

use crate::error::ApiError;

/// A dynamic `UPDATE` and its bind values, in placeholder order.
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<String>,
}

/// `allowed` maps JSON keys of the PATCH body to column names; any other key
/// is rejected, so column names never come from the client. Every value must
/// be a JSON string. `extra` is appended as-is (e.g. `updated_at`).
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[(&str, &str)],
    extra: Vec<(&str, String)>,
    id_column: &str,
    id_value: &str,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("Payload must be a JSON object".into()))?;

    if obj.is_empty() {
        return Err(ApiError::BadRequest("No fields provided for update".into()));
    }

    let mut columns = Vec::with_capacity(obj.len() + extra.len());
    let mut values = Vec::with_capacity(obj.len() + extra.len() + 1);

    for (key, value) in obj {
        let column = allowed
            .iter()
            .find(|(json_key, _)| json_key == key)
            .map(|(_, column)| *column)
            .ok_or_else(|| ApiError::BadRequest(format!("Field '{}' cannot be updated", key)))?;

        let value = value
            .as_str()
            .ok_or_else(|| ApiError::BadRequest(format!("Field '{}' must be a string", key)))?;

        columns.push(column);
        values.push(value.to_string());
    }

    for (column, value) in extra {
        columns.push(column);
        values.push(value);
    }

    let set_clause = columns
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    values.push(id_value.to_string());

    Ok(SqlUpdate { sql, values })
}

pub async fn execute_update(pool: &AnyPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = query.bind(value);
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}
