use crate::domain::message::{Message, MessageBody};
use crate::error::{AppError, Result};
use crate::storage::records::MessageRecord;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct MessageRepository {}

impl MessageRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Appends a message to a room.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the room does not exist.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, conn, body))]
    pub(crate) async fn insert(
        &self,
        conn: &mut SqliteConnection,
        room_id: i64,
        sender_id: Uuid,
        body: &MessageBody,
        sent_at: i64,
    ) -> Result<Message> {
        let result = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (room_id, sender_id, content, image_ref, sent_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, room_id, sender_id, content, image_ref, sent_at, is_read
            "#,
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(body.content.as_deref())
        .bind(body.image_ref.as_deref())
        .bind(sent_at)
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.kind() == sqlx::error::ErrorKind::ForeignKeyViolation => {
                Err(AppError::NotFound)
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Fetches a single message, scoped to its room so an anchor id from
    /// another room cannot leak history.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_in_room(
        &self,
        conn: &mut SqliteConnection,
        room_id: i64,
        message_id: i64,
    ) -> Result<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, room_id, sender_id, content, image_ref, sent_at, is_read
            FROM messages
            WHERE room_id = ?1 AND id = ?2
            "#,
        )
        .bind(room_id)
        .bind(message_id)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Fetches one page of history: the `limit` newest messages older than
    /// the anchor (or the newest overall without one), returned oldest first.
    /// Only messages sent strictly after `visible_after` are considered.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn list_page(
        &self,
        conn: &mut SqliteConnection,
        room_id: i64,
        visible_after: i64,
        before: Option<(i64, i64)>,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let mut records = match before {
            Some((anchor_sent_at, anchor_id)) => {
                sqlx::query_as::<_, MessageRecord>(
                    r#"
                    SELECT id, room_id, sender_id, content, image_ref, sent_at, is_read
                    FROM messages
                    WHERE room_id = ?1
                      AND sent_at > ?2
                      AND (sent_at, id) < (?3, ?4)
                    ORDER BY sent_at DESC, id DESC
                    LIMIT ?5
                    "#,
                )
                .bind(room_id)
                .bind(visible_after)
                .bind(anchor_sent_at)
                .bind(anchor_id)
                .bind(limit)
                .fetch_all(conn)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageRecord>(
                    r#"
                    SELECT id, room_id, sender_id, content, image_ref, sent_at, is_read
                    FROM messages
                    WHERE room_id = ?1
                      AND sent_at > ?2
                    ORDER BY sent_at DESC, id DESC
                    LIMIT ?3
                    "#,
                )
                .bind(room_id)
                .bind(visible_after)
                .bind(limit)
                .fetch_all(conn)
                .await?
            }
        };

        records.reverse();
        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Counts messages the reader has not seen: unread rows sent by the
    /// counterpart. A sender's own messages never count against them.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn count_unread(&self, conn: &mut SqliteConnection, room_id: i64, reader_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE room_id = ?1 AND is_read = 0 AND sender_id <> ?2",
        )
        .bind(room_id)
        .bind(reader_id)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    /// Flips every unread counterpart message in the room to read.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn mark_all_read(
        &self,
        conn: &mut SqliteConnection,
        room_id: i64,
        reader_id: Uuid,
    ) -> Result<u64> {
        let result =
            sqlx::query("UPDATE messages SET is_read = 1 WHERE room_id = ?1 AND sender_id <> ?2 AND is_read = 0")
                .bind(room_id)
                .bind(reader_id)
                .execute(conn)
                .await?;

        Ok(result.rows_affected())
    }
}
