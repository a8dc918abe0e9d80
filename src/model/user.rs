use serde::Serialize;
use utoipa::ToSchema;

use super::role::Role;

/// Balance sentinel meaning "no limit".
pub const UNLIMITED_TOKENS: i64 = -1;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": "0b9f6c5e-7a51-4a8e-9c1e-0d1f3c1f2b11",
    "userId": "5d2b3f0a-1c8e-4f55-8a4f-1e2f9b0c7d21",
    "email": "jane@company.com",
    "name": "Jane Doe",
    "role": "employee",
    "aiTokensRemaining": 10,
    "createdAt": "2026-01-01T09:00:00.000000Z"
}))]
pub struct User {
    pub id: String,
    /// auth account id, referenced by tasks, attendance and messages
    pub user_id: String,
    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub ai_tokens_remaining: i64,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: String,
}

impl User {
    pub fn has_unlimited_tokens(&self) -> bool {
        self.role.is_admin() || self.ai_tokens_remaining == UNLIMITED_TOKENS
    }
}
