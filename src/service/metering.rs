//! AI token accounting. Admins, and any account holding the `-1` sentinel,
//! are never debited; everyone else is debited with one conditional UPDATE
//! so two concurrent requests cannot both spend the same balance.

use serde::Serialize;
use sqlx::AnyPool;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    api::user::find_by_user_id,
    error::ApiError,
    model::{
        ai_usage::AiUsageRecord,
        role::Role,
        user::{UNLIMITED_TOKENS, User},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenCheck {
    pub success: bool,
    /// `-1` when the account is unlimited
    pub tokens_remaining: i64,
}

impl TokenCheck {
    fn unlimited() -> Self {
        TokenCheck {
            success: true,
            tokens_remaining: UNLIMITED_TOKENS,
        }
    }

    /// Whether this check actually took tokens from a finite balance.
    pub fn debited(&self) -> bool {
        self.success && self.tokens_remaining != UNLIMITED_TOKENS
    }
}

/// Current balance, `-1` for unlimited accounts.
pub async fn balance(pool: &AnyPool, user_id: &str) -> Result<i64, ApiError> {
    let user = find_by_user_id(pool, user_id).await?;
    Ok(if user.has_unlimited_tokens() {
        UNLIMITED_TOKENS
    } else {
        user.ai_tokens_remaining
    })
}

pub async fn check_and_consume(
    pool: &AnyPool,
    user_id: &str,
    requested: i64,
) -> Result<TokenCheck, ApiError> {
    if requested <= 0 {
        return Err(ApiError::BadRequest(
            "Requested token count must be positive".into(),
        ));
    }

    let user = find_by_user_id(pool, user_id).await?;
    if user.has_unlimited_tokens() {
        debug!(user_id, role = %user.role, "Unlimited account, nothing to debit");
        return Ok(TokenCheck::unlimited());
    }

    let result = sqlx::query(
        r#"
        UPDATE users
        SET ai_tokens_remaining = ai_tokens_remaining - ?
        WHERE user_id = ?
        AND role <> ?
        AND ai_tokens_remaining >= ?
        "#,
    )
    .bind(requested)
    .bind(user_id)
    .bind(Role::Admin.as_ref())
    .bind(requested)
    .execute(pool)
    .await
    .map_err(|e| ApiError::internal("Error updating token balance", e))?;

    // re-read either way: the balance may have moved since the first lookup
    let current = find_by_user_id(pool, user_id).await?;

    if result.rows_affected() == 0 {
        if current.has_unlimited_tokens() {
            return Ok(TokenCheck::unlimited());
        }

        info!(
            user_id,
            requested,
            remaining = current.ai_tokens_remaining,
            "Insufficient AI tokens"
        );
        return Ok(TokenCheck {
            success: false,
            tokens_remaining: current.ai_tokens_remaining,
        });
    }

    debug!(user_id, requested, remaining = current.ai_tokens_remaining, "Tokens debited");
    Ok(TokenCheck {
        success: true,
        tokens_remaining: current.ai_tokens_remaining,
    })
}

/// Gives back tokens taken by a request that could not be served.
pub async fn refund(pool: &AnyPool, user_id: &str, tokens: i64) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        UPDATE users
        SET ai_tokens_remaining = ai_tokens_remaining + ?
        WHERE user_id = ?
        AND ai_tokens_remaining <> ?
        "#,
    )
    .bind(tokens)
    .bind(user_id)
    .bind(UNLIMITED_TOKENS)
    .execute(pool)
    .await
    .map_err(|e| ApiError::internal("Error refunding tokens", e))?;

    info!(user_id, tokens, "Tokens refunded");
    Ok(())
}

pub async fn record_usage(pool: &AnyPool, record: &AiUsageRecord) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO ai_usage (id, user_id, tokens_used, prompt, response, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.user_id)
    .bind(record.tokens_used)
    .bind(&record.prompt)
    .bind(&record.response)
    .bind(&record.created_at)
    .execute(pool)
    .await
    .map_err(|e| ApiError::internal("Error recording AI usage", e))?;

    Ok(())
}

/// Overwrites a user's allocation. `-1` grants unlimited use.
pub async fn set_allocation(pool: &AnyPool, user_id: &str, amount: i64) -> Result<User, ApiError> {
    if amount < UNLIMITED_TOKENS {
        return Err(ApiError::BadRequest(
            "Token amount must be -1 (unlimited) or a non-negative number".into(),
        ));
    }

    sqlx::query("UPDATE users SET ai_tokens_remaining = ? WHERE user_id = ?")
        .bind(amount)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| ApiError::internal("Error updating token allocation", e))?;

    // affected rows are not trusted here: MySQL reports 0 when the value is unchanged
    let user = find_by_user_id(pool, user_id).await?;

    info!(user_id, amount, "Token allocation updated");
    Ok(user)
}
