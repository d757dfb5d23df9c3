use crate::domain::message::Message;
use crate::services::fanout::RoomActivity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// Frames the server pushes down a gateway connection. Serialized as JSON
/// text frames tagged by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once after the upgrade, confirming the authenticated identity.
    Ready { user_id: Uuid },

    /// A message in a room the client subscribed to.
    Message {
        message_id: i64,
        room_id: i64,
        sender_id: Uuid,
        content: Option<String>,
        image_ref: Option<String>,
        sent_at: i64,
    },

    /// Activity in any of the client's rooms, subscribed or not. Carries the
    /// preview rather than the full body.
    RoomActivity {
        room_id: i64,
        message_id: i64,
        sender_id: Uuid,
        last_message: String,
        last_message_at: i64,
    },

    Subscribed { room_id: i64 },

    Unsubscribed { room_id: i64 },

    /// A rejected frame. The connection stays open.
    Error { message: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe { room_id: i64 },
    Unsubscribe { room_id: i64 },
}

impl From<&Message> for ServerFrame {
    fn from(message: &Message) -> Self {
        Self::Message {
            message_id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            image_ref: message.image_ref.clone(),
            sent_at: message.sent_at,
        }
    }
}

impl From<&RoomActivity> for ServerFrame {
    fn from(activity: &RoomActivity) -> Self {
        Self::RoomActivity {
            room_id: activity.room_id,
            message_id: activity.message_id,
            sender_id: activity.sender_id,
            last_message: activity.preview.clone(),
            last_message_at: activity.sent_at,
        }
    }
}
