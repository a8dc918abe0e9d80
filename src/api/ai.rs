use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::AnyPool;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::ai_usage::AiUsageRecord,
    service::{ai_client::AiClient, metering},
};

const DEFAULT_ESTIMATED_TOKENS: i64 = 100;
const MAX_PROMPT_CHARS: usize = 4000;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    #[schema(example = "How should I plan a two-week sprint?")]
    pub prompt: String,
    /// Tokens to debit for this request, 100 when omitted
    #[schema(example = 100)]
    pub estimated_tokens: Option<i64>,
}

/// Ask the AI assistant
///
/// Debits the estimated token count up front; admins and unlimited accounts
/// are never debited. Tokens are credited back when the provider fails or the
/// usage record cannot be stored.
#[utoipa::path(
    post,
    path = "/api/ai/request",
    request_body = AiRequest,
    responses(
        (status = 200, description = "Assistant reply", body = Object, example = json!({
            "success": true,
            "response": "Break the work into small tasks...",
            "tokensRemaining": 9
        })),
        (status = 400, description = "Insufficient tokens, blank or overlong prompt", body = Object, example = json!({
            "success": false,
            "error": "Insufficient tokens. You have 5 tokens remaining.",
            "tokensRemaining": 5
        })),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "AI provider failed")
    ),
    security(("bearer_auth" = [])),
    tag = "AI"
)]
#[instrument(
    name = "ai_request",
    skip(auth, pool, client, payload),
    fields(user_id = %auth.user_id)
)]
pub async fn send_ai_request(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    client: web::Data<AiClient>,
    payload: web::Json<AiRequest>,
) -> Result<HttpResponse, ApiError> {
    let prompt = payload.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("Prompt is required".into()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Prompt must be at most {} characters",
            MAX_PROMPT_CHARS
        )));
    }

    let requested = payload.estimated_tokens.unwrap_or(DEFAULT_ESTIMATED_TOKENS);
    let check = metering::check_and_consume(pool.get_ref(), &auth.user_id, requested).await?;

    if !check.success {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": format!(
                "Insufficient tokens. You have {} tokens remaining.",
                check.tokens_remaining
            ),
            "tokensRemaining": check.tokens_remaining
        })));
    }

    let response = match client.complete(prompt).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, provider = client.provider().as_ref(), "AI request failed");
            if check.debited() {
                metering::refund(pool.get_ref(), &auth.user_id, requested).await?;
            }
            return Err(ApiError::BadGateway(format!("AI service error: {}", e)));
        }
    };

    let record = AiUsageRecord::new(&auth.user_id, requested, prompt, &response);
    if let Err(e) = metering::record_usage(pool.get_ref(), &record).await {
        if check.debited() {
            metering::refund(pool.get_ref(), &auth.user_id, requested).await?;
        }
        return Err(e);
    }

    info!(tokens = requested, remaining = check.tokens_remaining, "AI request served");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "response": response,
        "tokensRemaining": check.tokens_remaining
    })))
}

/// Current AI token balance of the caller
#[utoipa::path(
    get,
    path = "/api/ai/balance",
    responses(
        (status = 200, description = "`-1` means unlimited", body = Object, example = json!({
            "success": true,
            "tokensRemaining": 10
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "AI"
)]
pub async fn get_balance(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
) -> Result<HttpResponse, ApiError> {
    let tokens_remaining = metering::balance(pool.get_ref(), &auth.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "tokensRemaining": tokens_remaining
    })))
}
