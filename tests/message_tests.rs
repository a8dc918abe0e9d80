mod common;

use actix_web::http::StatusCode;
use serde_json::json;

use common::*;

async fn say<S, B>(app: &S, from: &Account, to: &Account, content: &str)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse<B>,
            Error = actix_web::Error,
        >,
    B: actix_web::body::MessageBody,
{
    let (status, body) = send(
        app,
        bearer(post("/api/messages"), &from.access_token).set_json(json!({
            "receiverId": to.user_id,
            "content": content,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
}

#[actix_web::test]
async fn sent_message_is_attributed_to_the_caller() {
    let (app, _pool) = spawn_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let (status, body) = send(
        &app,
        bearer(post("/api/messages"), &alice.access_token).set_json(json!({
            "receiverId": bob.user_id,
            "content": "Hi Bob",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Message sent successfully");
    assert_eq!(body["data"]["senderId"], alice.user_id.as_str());
    assert_eq!(body["data"]["isRead"], false);

    // impersonation is refused
    let (status, _) = send(
        &app,
        bearer(post("/api/messages"), &alice.access_token).set_json(json!({
            "senderId": bob.user_id,
            "receiverId": alice.user_id,
            "content": "I am Bob",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn conversation_holds_both_directions_oldest_first() {
    let (app, _pool) = spawn_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let carol = register(&app, "carol").await;

    say(&app, &alice, &bob, "one").await;
    say(&app, &bob, &alice, "two").await;
    say(&app, &carol, &alice, "unrelated").await;
    say(&app, &alice, &bob, "three").await;

    let uri = format!(
        "/api/messages/conversation?user1Id={}&user2Id={}",
        alice.user_id, bob.user_id
    );
    let (status, body) = send(&app, bearer(get(&uri), &bob.access_token)).await;
    assert_eq!(status, StatusCode::OK);

    let contents: Vec<_> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["one", "two", "three"]);

    // outsiders may not read it
    let (status, _) = send(&app, bearer(get(&uri), &carol.access_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn conversation_requires_both_ids() {
    let (app, _pool) = spawn_app().await;
    let alice = register(&app, "alice").await;

    let uri = format!("/api/messages/conversation?user1Id={}", alice.user_id);
    let (status, body) = send(&app, bearer(get(&uri), &alice.access_token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Both user IDs are required");
}

#[actix_web::test]
async fn conversations_list_one_latest_message_per_partner() {
    let (app, _pool) = spawn_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let carol = register(&app, "carol").await;

    say(&app, &alice, &bob, "hello bob").await;
    say(&app, &carol, &alice, "hello alice").await;
    say(&app, &bob, &alice, "bob replies").await;

    let uri = format!("/api/messages/user/{}", alice.user_id);
    let (status, body) = send(&app, bearer(get(&uri), &alice.access_token)).await;
    assert_eq!(status, StatusCode::OK);

    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0]["partnerId"], bob.user_id.as_str());
    assert_eq!(conversations[0]["latestMessage"]["content"], "bob replies");
    assert_eq!(conversations[1]["partnerId"], carol.user_id.as_str());

    let (status, _) = send(&app, bearer(get(&uri), &bob.access_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn only_the_receiver_can_mark_a_message_read() {
    let (app, _pool) = spawn_app().await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    say(&app, &alice, &bob, "ping").await;

    let (status, body) = send(&app, bearer(get("/api/messages/inbox"), &bob.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    let uri = format!("/api/messages/{}/read", messages[0]["id"].as_str().unwrap());

    let (status, _) = send(&app, bearer(patch(&uri), &alice.access_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, bearer(patch(&uri), &bob.access_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isRead"], true);

    let (status, _) = send(
        &app,
        bearer(patch("/api/messages/missing/read"), &bob.access_token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // sent messages do not show up in the sender's inbox
    let (_, body) = send(&app, bearer(get("/api/messages/inbox"), &alice.access_token)).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}
