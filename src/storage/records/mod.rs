pub mod message;
pub mod room;

pub(crate) use message::MessageRecord;
pub(crate) use room::{RoomRecord, RoomWithUnreadRecord};
