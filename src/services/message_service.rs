use crate::config::ChatConfig;
use crate::domain::message::{Message, MessageBody};
use crate::domain::now_unix_ms;
use crate::domain::room::Room;
use crate::error::{AppError, Result};
use crate::services::fanout::Fanout;
use crate::storage::DbPool;
use crate::storage::message_repo::MessageRepository;
use crate::storage::room_repo::RoomRepository;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) sent_total: Counter<u64>,
    pub(crate) marked_read_total: Counter<u64>,
    pub(crate) page_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            sent_total: meter
                .u64_counter("parley_messages_sent_total")
                .with_description("Total messages accepted or rejected by the send path")
                .build(),
            marked_read_total: meter
                .u64_counter("parley_messages_marked_read_total")
                .with_description("Total messages flipped to read")
                .build(),
            page_size: meter
                .u64_histogram("parley_message_page_size")
                .with_description("Number of messages returned per history page")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MessageService {
    pool: DbPool,
    rooms: RoomRepository,
    messages: MessageRepository,
    fanout: Arc<dyn Fanout>,
    config: ChatConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        rooms: RoomRepository,
        messages: MessageRepository,
        fanout: Arc<dyn Fanout>,
        config: ChatConfig,
    ) -> Self {
        Self { pool, rooms, messages, fanout, config, metrics: Metrics::new() }
    }

    /// Validates, persists, and fans out a message. The row and the room's
    /// preview land in one transaction; delivery happens only after commit,
    /// so subscribers never see a message that failed to persist.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown rooms, `AppError::Forbidden`
    /// for non-participants, and `AppError::BadRequest` for empty or oversized
    /// payloads.
    #[tracing::instrument(err(level = "warn"), skip(self, content, image_ref), fields(sender_id = %sender_id))]
    pub async fn send(
        &self,
        sender_id: Uuid,
        room_id: i64,
        content: Option<String>,
        image_ref: Option<String>,
    ) -> Result<Message> {
        match self.persist(sender_id, room_id, content, image_ref).await {
            Ok((room, message, preview)) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
                tracing::debug!(message_id = message.id, "Message stored");

                self.fanout.publish(&room, &message, preview).await;
                Ok(message)
            }
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        sender_id: Uuid,
        room_id: i64,
        content: Option<String>,
        image_ref: Option<String>,
    ) -> Result<(Room, Message, String)> {
        // Rooms are never physically removed and the participant set is
        // immutable, so these checks can run outside the write transaction.
        let room = {
            let mut conn = self.pool.acquire().await?;
            self.rooms.find_by_id(&mut conn, room_id).await?.ok_or(AppError::NotFound)?
        };
        if !room.has_participant(sender_id) {
            return Err(AppError::Forbidden);
        }

        let body = MessageBody::new(content, image_ref, self.config.message_max_chars)?;
        let preview = body.preview(self.config.preview_max_chars);
        let sent_at = now_unix_ms();

        let mut tx = self.pool.begin().await?;
        let message = self.messages.insert(&mut tx, room_id, sender_id, &body, sent_at).await?;
        self.rooms.update_preview(&mut tx, room_id, &preview, sent_at).await?;
        tx.commit().await?;

        Ok((room, message, preview))
    }

    /// Pages through a room's history, oldest first within the page, bounded
    /// by the caller's own visibility cutoff.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown rooms or a `before` anchor
    /// that is not in the room, and `AppError::Forbidden` for non-participants.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn list(
        &self,
        user_id: Uuid,
        room_id: i64,
        limit: Option<i64>,
        before: Option<i64>,
    ) -> Result<Vec<Message>> {
        let mut conn = self.pool.acquire().await?;

        let room = self.rooms.find_by_id(&mut conn, room_id).await?.ok_or(AppError::NotFound)?;
        if !room.has_participant(user_id) {
            return Err(AppError::Forbidden);
        }

        let limit = limit.unwrap_or(self.config.default_page_size).clamp(1, self.config.max_page_size);
        let visible_after = room.cleared_at_for(user_id).unwrap_or(0);

        let anchor = match before {
            Some(before_id) => {
                let anchor = self
                    .messages
                    .find_in_room(&mut conn, room_id, before_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                Some((anchor.sent_at, anchor.id))
            }
            None => None,
        };

        let page = self.messages.list_page(&mut conn, room_id, visible_after, anchor, limit).await?;
        self.metrics.page_size.record(page.len() as u64, &[]);

        Ok(page)
    }

    /// Marks every unread counterpart message in the room as read and
    /// returns how many were flipped. Idempotent.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown rooms and `AppError::Forbidden`
    /// for non-participants.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn mark_all_read(&self, user_id: Uuid, room_id: i64) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;

        let room = self.rooms.find_by_id(&mut conn, room_id).await?.ok_or(AppError::NotFound)?;
        if !room.has_participant(user_id) {
            return Err(AppError::Forbidden);
        }

        let marked = self.messages.mark_all_read(&mut conn, room_id, user_id).await?;
        if marked > 0 {
            self.metrics.marked_read_total.add(marked, &[]);
        }

        Ok(marked)
    }
}
