use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::AnyPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::auth::AuthUser,
    error::ApiError,
    model::{message::Message, new_id, timestamp_now},
    service::conversation::{conversation_between, latest_per_partner},
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    /// Defaults to the caller
    pub sender_id: Option<String>,
    pub receiver_id: String,
    #[schema(example = "Can you review the Q3 report?")]
    pub content: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    pub user1_id: Option<String>,
    pub user2_id: Option<String>,
}

async fn messages_involving(pool: &AnyPool, user_id: &str) -> Result<Vec<Message>, ApiError> {
    sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE sender_id = ?
        OR receiver_id = ?
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| ApiError::internal("Error fetching messages", e))
}

/// Send a message
#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = SendMessage,
    responses(
        (status = 201, description = "Message sent successfully", body = Message),
        (status = 400, description = "Missing receiver or content"),
        (status = 403, description = "Cannot send on behalf of another user")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn send_message(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    payload: web::Json<SendMessage>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let sender_id = payload.sender_id.unwrap_or_else(|| auth.user_id.clone());
    auth.require_self_or_admin(&sender_id)?;

    let receiver_id = payload.receiver_id.trim();
    if receiver_id.is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Receiver and content are required".into(),
        ));
    }

    let message = Message {
        id: new_id(),
        sender_id,
        receiver_id: receiver_id.to_string(),
        content: payload.content,
        is_read: 0,
        created_at: timestamp_now(),
    };

    sqlx::query(
        r#"
        INSERT INTO messages (id, sender_id, receiver_id, content, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.id)
    .bind(&message.sender_id)
    .bind(&message.receiver_id)
    .bind(&message.content)
    .bind(message.is_read)
    .bind(&message.created_at)
    .execute(pool.get_ref())
    .await
    .map_err(|e| ApiError::internal("Error sending message", e))?;

    info!(
        message_id = %message.id,
        sender = %message.sender_id,
        receiver = %message.receiver_id,
        "Message sent"
    );

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Message sent successfully",
        "data": message
    })))
}

/// Messages between two users, oldest first
#[utoipa::path(
    get,
    path = "/api/messages/conversation",
    params(ConversationQuery),
    responses(
        (status = 200, description = "Conversation thread", body = Object, example = json!({
            "success": true,
            "messages": []
        })),
        (status = 400, description = "Both user IDs are required"),
        (status = 403, description = "Not a participant")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn get_conversation(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    query: web::Query<ConversationQuery>,
) -> Result<HttpResponse, ApiError> {
    let (user1, user2) = match (query.user1_id.as_deref(), query.user2_id.as_deref()) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => (a, b),
        _ => return Err(ApiError::BadRequest("Both user IDs are required".into())),
    };

    if !auth.is_admin() && auth.user_id != user1 && auth.user_id != user2 {
        return Err(ApiError::Forbidden(
            "Not allowed to read this conversation".into(),
        ));
    }

    let messages = conversation_between(
        user1,
        user2,
        messages_involving(pool.get_ref(), user1).await?,
    );
    debug!(user1, user2, count = messages.len(), "Conversation loaded");

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "messages": messages
    })))
}

/// Latest message per conversation partner, newest first
#[utoipa::path(
    get,
    path = "/api/messages/user/{user_id}",
    params(("user_id" = String, Path, description = "Auth account id")),
    responses(
        (status = 200, description = "One entry per partner", body = Object, example = json!({
            "success": true,
            "conversations": []
        })),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn get_all_conversations(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth.require_self_or_admin(&user_id)?;

    let conversations = latest_per_partner(
        &user_id,
        messages_involving(pool.get_ref(), &user_id).await?,
    );

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "conversations": conversations
    })))
}

/// Messages received by the caller, newest first
#[utoipa::path(
    get,
    path = "/api/messages/inbox",
    responses(
        (status = 200, description = "Received messages", body = Object, example = json!({
            "success": true,
            "messages": []
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn inbox(auth: AuthUser, pool: web::Data<AnyPool>) -> Result<HttpResponse, ApiError> {
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT * FROM messages
        WHERE receiver_id = ?
        ORDER BY created_at DESC, id ASC
        "#,
    )
    .bind(&auth.user_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| ApiError::internal("Error fetching inbox", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "messages": messages
    })))
}

/// Mark a received message as read
#[utoipa::path(
    patch,
    path = "/api/messages/{message_id}/read",
    params(("message_id" = String, Path, description = "Message id")),
    responses(
        (status = 200, description = "Message marked as read", body = Message),
        (status = 403, description = "Only the receiver may mark a message read"),
        (status = 404, description = "Message not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Messages"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<AnyPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let message_id = path.into_inner();

    let mut message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
        .bind(&message_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| ApiError::internal("Error fetching message", e))?
        .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;

    if message.receiver_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "Only the receiver may mark a message read".into(),
        ));
    }

    if message.is_read == 0 {
        sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?")
            .bind(&message_id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| ApiError::internal("Error updating message", e))?;
        message.is_read = 1;
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Message marked as read",
        "data": message
    })))
}
