use serde::Serialize;

/// Audit entry appended for every metered AI request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiUsageRecord {
    pub id: String,
    pub user_id: String,
    pub tokens_used: i64,
    pub prompt: String,
    pub response: String,
    pub created_at: String,
}

impl AiUsageRecord {
    pub fn new(user_id: &str, tokens_used: i64, prompt: &str, response: &str) -> Self {
        Self {
            id: super::new_id(),
            user_id: user_id.to_string(),
            tokens_used,
            prompt: prompt.to_string(),
            response: response.to_string(),
            created_at: super::timestamp_now(),
        }
    }
}
