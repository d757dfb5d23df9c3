use crate::domain::auth::Principal;
use crate::domain::now_unix_ms;
use crate::domain::room::{PairKey, Room};
use crate::error::{AppError, Result};
use crate::services::listing::ListingDirectory;
use crate::storage::DbPool;
use crate::storage::message_repo::MessageRepository;
use crate::storage::room_repo::RoomRepository;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) created_total: Counter<u64>,
    pub(crate) cleared_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            created_total: meter
                .u64_counter("parley_rooms_created_total")
                .with_description("Total rooms created")
                .build(),
            cleared_total: meter
                .u64_counter("parley_rooms_cleared_total")
                .with_description("Total per-user room clears and admin retirements")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoomService {
    pool: DbPool,
    rooms: RoomRepository,
    messages: MessageRepository,
    listings: Arc<dyn ListingDirectory>,
    metrics: Metrics,
}

impl RoomService {
    #[must_use]
    pub fn new(
        pool: DbPool,
        rooms: RoomRepository,
        messages: MessageRepository,
        listings: Arc<dyn ListingDirectory>,
    ) -> Self {
        Self { pool, rooms, messages, listings, metrics: Metrics::new() }
    }

    /// Returns the room pairing the actor with a counterpart, creating it on
    /// first contact. Idempotent: repeats and reversed pairs resolve to the
    /// same room, and a lost insert race falls back to the winner's row.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` when actor and counterpart are the same user.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(actor = %actor))]
    pub async fn get_or_create(&self, actor: Uuid, counterpart: Uuid) -> Result<(Room, bool)> {
        let key = PairKey::normalize(actor, counterpart)
            .ok_or_else(|| AppError::BadRequest("Cannot open a room with yourself".to_owned()))?;

        let mut conn = self.pool.acquire().await?;

        if let Some(room) = self.rooms.find_by_pair(&mut conn, key).await? {
            return Ok((room, false));
        }

        match self.rooms.insert(&mut conn, key, now_unix_ms()).await {
            Ok(room) => {
                self.metrics.created_total.add(1, &[]);
                tracing::debug!(room_id = room.id, "Room created");
                Ok((room, true))
            }
            Err(AppError::Conflict(_)) => {
                // Lost the insert race; the winner's row is the room.
                let room = self.rooms.find_by_pair(&mut conn, key).await?.ok_or(AppError::Internal)?;
                Ok((room, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Opens the room with a listing's seller.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` when the listing is unknown.
    /// Returns `AppError::BadRequest` when the actor is the seller.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(actor = %actor))]
    pub async fn get_or_create_for_listing(&self, actor: Uuid, product_id: i64) -> Result<(Room, bool)> {
        let seller = self.listings.seller_of(product_id).await.ok_or(AppError::NotFound)?;
        self.get_or_create(actor, seller).await
    }

    /// Lists the user's visible rooms with unread counts, newest activity first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn list_rooms(&self, user_id: Uuid) -> Result<Vec<(Room, i64)>> {
        let mut conn = self.pool.acquire().await?;
        self.rooms.list_visible(&mut conn, user_id).await
    }

    /// Fetches one room with the caller's unread count. Participants can
    /// always address a room they are in, cleared or retired.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown rooms and `AppError::Forbidden`
    /// for non-participants.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn room_detail(&self, user_id: Uuid, room_id: i64) -> Result<(Room, i64)> {
        let mut conn = self.pool.acquire().await?;

        let room = self.rooms.find_by_id(&mut conn, room_id).await?.ok_or(AppError::NotFound)?;
        if !room.has_participant(user_id) {
            return Err(AppError::Forbidden);
        }

        let unread = self.messages.count_unread(&mut conn, room_id, user_id).await?;
        Ok((room, unread))
    }

    /// Removes the room from the caller's own view by advancing their cutoff
    /// to now. The counterpart is unaffected; new activity brings the room back.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown rooms and `AppError::Forbidden`
    /// for non-participants.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn clear_for_me(&self, user_id: Uuid, room_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        let room = self.rooms.find_by_id(&mut conn, room_id).await?.ok_or(AppError::NotFound)?;
        let side = room.side_of(user_id).ok_or(AppError::Forbidden)?;

        self.rooms.set_cleared_at(&mut conn, room_id, side, now_unix_ms()).await?;
        self.metrics.cleared_total.add(1, &[KeyValue::new("kind", "self")]);
        Ok(())
    }

    /// Handles room removal: participants clear their own view; a
    /// non-participant admin retires the room for everyone.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown rooms and `AppError::Forbidden`
    /// for callers who are neither participants nor admins.
    #[tracing::instrument(err(level = "warn"), skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn remove(&self, principal: &Principal, room_id: i64) -> Result<()> {
        match self.clear_for_me(principal.user_id, room_id).await {
            Err(AppError::Forbidden) if principal.is_admin() => {
                let mut conn = self.pool.acquire().await?;
                self.rooms.mark_deleted(&mut conn, room_id).await?;
                self.metrics.cleared_total.add(1, &[KeyValue::new("kind", "retired")]);
                tracing::info!(room_id, "Room retired by admin");
                Ok(())
            }
            other => other,
        }
    }

    /// Confirms a user may subscribe to a room's realtime topic.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` for unknown rooms and `AppError::Forbidden`
    /// for non-participants.
    #[tracing::instrument(err(level = "debug"), skip(self))]
    pub async fn authorize_subscription(&self, user_id: Uuid, room_id: i64) -> Result<Room> {
        let mut conn = self.pool.acquire().await?;

        let room = self.rooms.find_by_id(&mut conn, room_id).await?.ok_or(AppError::NotFound)?;
        if !room.has_participant(user_id) {
            return Err(AppError::Forbidden);
        }

        Ok(room)
    }
}
