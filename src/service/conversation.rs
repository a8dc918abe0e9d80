//! Conversations are not stored; they are derived from the flat message
//! list every time they are read.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::message::Message;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub partner_id: String,
    pub latest_message: Message,
}

/// Orders by parsed send time, falling back to the raw timestamp text when
/// either side does not parse.
fn compare_sent(a: &Message, b: &Message) -> Ordering {
    match (a.sent_at(), b.sent_at()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.created_at.cmp(&b.created_at),
    }
}

/// Messages exchanged between `a` and `b` in either direction, oldest first.
pub fn conversation_between(a: &str, b: &str, messages: Vec<Message>) -> Vec<Message> {
    let mut thread: Vec<Message> = messages
        .into_iter()
        .filter(|m| {
            (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
        })
        .collect();

    thread.sort_by(|x, y| compare_sent(x, y).then_with(|| x.id.cmp(&y.id)));
    thread
}

/// One entry per counterpart of `user_id`, carrying that counterpart's most
/// recent message, newest conversation first.
pub fn latest_per_partner(user_id: &str, messages: Vec<Message>) -> Vec<ConversationSummary> {
    let mut latest: HashMap<String, Message> = HashMap::new();

    for message in messages {
        if message.sender_id != user_id && message.receiver_id != user_id {
            continue;
        }

        let partner = message.partner_of(user_id).to_string();
        let newer = latest
            .get(&partner)
            .is_none_or(|current| compare_sent(&message, current) == Ordering::Greater);

        if newer {
            latest.insert(partner, message);
        }
    }

    let mut conversations: Vec<ConversationSummary> = latest
        .into_iter()
        .map(|(partner_id, latest_message)| ConversationSummary {
            partner_id,
            latest_message,
        })
        .collect();

    conversations.sort_by(|a, b| {
        compare_sent(&b.latest_message, &a.latest_message)
            .then_with(|| a.partner_id.cmp(&b.partner_id))
    });

    conversations
}
