use crate::domain::room::{PairKey, PairSide, Room};
use crate::error::{AppError, Result};
use crate::storage::records::{RoomRecord, RoomWithUnreadRecord};
use sqlx::SqliteConnection;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct RoomRepository {}

impl RoomRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Looks up the room for a normalized pair, deleted or not.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_pair(&self, conn: &mut SqliteConnection, key: PairKey) -> Result<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, user_lo, user_hi, last_message, last_message_at,
                   lo_cleared_at, hi_cleared_at, deleted, created_at
            FROM rooms
            WHERE user_lo = ?1 AND user_hi = ?2
            "#,
        )
        .bind(key.lo)
        .bind(key.hi)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Inserts a new room for a pair.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` when another request created the pair's
    /// room first; the caller is expected to re-read.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn insert(&self, conn: &mut SqliteConnection, key: PairKey, created_at: i64) -> Result<Room> {
        let result = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO rooms (user_lo, user_hi, created_at)
            VALUES (?1, ?2, ?3)
            RETURNING id, user_lo, user_hi, last_message, last_message_at,
                      lo_cleared_at, hi_cleared_at, deleted, created_at
            "#,
        )
        .bind(key.lo)
        .bind(key.hi)
        .bind(created_at)
        .fetch_one(conn)
        .await;

        match result {
            Ok(record) => Ok(record.into()),
            Err(sqlx::Error::Database(e)) if e.kind() == sqlx::error::ErrorKind::UniqueViolation => {
                Err(AppError::Conflict("Room already exists for this pair".to_owned()))
            }
            Err(e) => Err(AppError::Database(e)),
        }
    }

    /// Fetches a room by id regardless of visibility or deletion state.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn find_by_id(&self, conn: &mut SqliteConnection, room_id: i64) -> Result<Option<Room>> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, user_lo, user_hi, last_message, last_message_at,
                   lo_cleared_at, hi_cleared_at, deleted, created_at
            FROM rooms
            WHERE id = ?1
            "#,
        )
        .bind(room_id)
        .fetch_optional(conn)
        .await?;

        Ok(record.map(Into::into))
    }

    /// Lists the user's visible rooms with their unread counts, newest
    /// activity first. A room is visible when it is not deleted and has
    /// activity strictly after the user's own clear cutoff.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn list_visible(&self, conn: &mut SqliteConnection, user_id: Uuid) -> Result<Vec<(Room, i64)>> {
        let records = sqlx::query_as::<_, RoomWithUnreadRecord>(
            r#"
            SELECT r.id, r.user_lo, r.user_hi, r.last_message, r.last_message_at,
                   r.lo_cleared_at, r.hi_cleared_at, r.deleted, r.created_at,
                   (
                       SELECT COUNT(*) FROM messages m
                       WHERE m.room_id = r.id AND m.is_read = 0 AND m.sender_id <> ?1
                   ) AS unread_count
            FROM rooms r
            WHERE (r.user_lo = ?1 OR r.user_hi = ?1)
              AND r.deleted = 0
              AND COALESCE(r.last_message_at, r.created_at) >
                  COALESCE(CASE WHEN r.user_lo = ?1 THEN r.lo_cleared_at ELSE r.hi_cleared_at END, 0)
            ORDER BY COALESCE(r.last_message_at, r.created_at) DESC, r.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(conn)
        .await?;

        Ok(records.into_iter().map(|r| (r.room.into(), r.unread_count)).collect())
    }

    /// Advances one participant's visibility cutoff.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn set_cleared_at(
        &self,
        conn: &mut SqliteConnection,
        room_id: i64,
        side: PairSide,
        cleared_at: i64,
    ) -> Result<()> {
        let query = match side {
            PairSide::Lo => "UPDATE rooms SET lo_cleared_at = ?2 WHERE id = ?1",
            PairSide::Hi => "UPDATE rooms SET hi_cleared_at = ?2 WHERE id = ?1",
        };
        sqlx::query(query).bind(room_id).bind(cleared_at).execute(conn).await?;
        Ok(())
    }

    /// Records the latest message snippet on the room. New activity also
    /// clears the deleted flag, resurrecting retired rooms.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn, preview))]
    pub(crate) async fn update_preview(
        &self,
        conn: &mut SqliteConnection,
        room_id: i64,
        preview: &str,
        at: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE rooms SET last_message = ?2, last_message_at = ?3, deleted = 0 WHERE id = ?1")
            .bind(room_id)
            .bind(preview)
            .bind(at)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Retires a room for everyone. History stays in place so new activity
    /// can bring the room back.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the update fails.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub(crate) async fn mark_deleted(&self, conn: &mut SqliteConnection, room_id: i64) -> Result<()> {
        sqlx::query("UPDATE rooms SET deleted = 1 WHERE id = ?1").bind(room_id).execute(conn).await?;
        Ok(())
    }
}
