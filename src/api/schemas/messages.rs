use crate::domain::message::Message;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: Option<String>,
    pub image_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
    /// Message id to page backwards from; the page ends just before it.
    pub before: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message_id: i64,
    pub room_id: i64,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub image_ref: Option<String>,
    pub sent_at: i64,
    pub is_read: bool,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            message_id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content,
            image_ref: message.image_ref,
            sent_at: message.sent_at,
            is_read: message.is_read,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}
