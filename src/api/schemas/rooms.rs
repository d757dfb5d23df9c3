use crate::domain::room::Room;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /v1/rooms`. Exactly one of the two fields must be set:
/// `counterpart_id` opens a direct room, `product_id` resolves the listing's
/// seller and opens a room with them.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub counterpart_id: Option<Uuid>,
    pub product_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub room_id: i64,
    pub counterpart_id: Uuid,
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
    pub deleted: bool,
    pub created_at: i64,
}

impl RoomResponse {
    /// Shapes a room for one participant's view. Handlers only shape rooms
    /// the viewer belongs to.
    #[must_use]
    pub(crate) fn for_viewer(room: &Room, viewer: Uuid) -> Self {
        Self {
            room_id: room.id,
            counterpart_id: room.counterpart_of(viewer).unwrap_or(room.user_lo),
            last_message: room.last_message.clone(),
            last_message_at: room.last_message_at,
            deleted: room.deleted,
            created_at: room.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RoomListItem {
    #[serde(flatten)]
    pub room: RoomResponse,
    pub unread_count: i64,
}
