use crate::domain::room::Room;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct RoomRecord {
    pub(crate) id: i64,
    pub(crate) user_lo: Uuid,
    pub(crate) user_hi: Uuid,
    pub(crate) last_message: Option<String>,
    pub(crate) last_message_at: Option<i64>,
    pub(crate) lo_cleared_at: Option<i64>,
    pub(crate) hi_cleared_at: Option<i64>,
    pub(crate) deleted: bool,
    pub(crate) created_at: i64,
}

impl From<RoomRecord> for Room {
    fn from(record: RoomRecord) -> Self {
        Self {
            id: record.id,
            user_lo: record.user_lo,
            user_hi: record.user_hi,
            last_message: record.last_message,
            last_message_at: record.last_message_at,
            lo_cleared_at: record.lo_cleared_at,
            hi_cleared_at: record.hi_cleared_at,
            deleted: record.deleted,
            created_at: record.created_at,
        }
    }
}

/// Room row joined with the caller's unread count, as produced by the
/// visible-rooms query.
#[derive(Debug, sqlx::FromRow)]
pub struct RoomWithUnreadRecord {
    #[sqlx(flatten)]
    pub(crate) room: RoomRecord,
    pub(crate) unread_count: i64,
}
