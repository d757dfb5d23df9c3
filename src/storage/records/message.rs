use crate::domain::message::Message;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRecord {
    pub(crate) id: i64,
    pub(crate) room_id: i64,
    pub(crate) sender_id: Uuid,
    pub(crate) content: Option<String>,
    pub(crate) image_ref: Option<String>,
    pub(crate) sent_at: i64,
    pub(crate) is_read: bool,
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            room_id: record.room_id,
            sender_id: record.sender_id,
            content: record.content,
            image_ref: record.image_ref,
            sent_at: record.sent_at,
            is_read: record.is_read,
        }
    }
}
