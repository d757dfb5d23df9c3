use crate::config::FanoutConfig;
use crate::domain::message::Message;
use crate::domain::room::Room;
use async_trait::async_trait;
use dashmap::DashMap;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram, UpDownCounter},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    published_total: Counter<u64>,
    unrouted_total: Counter<u64>,
    active_channels: UpDownCounter<i64>,
    gc_duration_seconds: Histogram<f64>,
    gc_reclaimed_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            published_total: meter
                .u64_counter("parley_fanout_published_total")
                .with_description("Total events published to fanout topics")
                .build(),
            unrouted_total: meter
                .u64_counter("parley_fanout_unrouted_total")
                .with_description("Events published to topics with no subscribers")
                .build(),
            active_channels: meter
                .i64_up_down_counter("parley_fanout_channels")
                .with_description("Number of live fanout channels")
                .build(),
            gc_duration_seconds: meter
                .f64_histogram("parley_fanout_gc_duration_seconds")
                .with_description("Time taken to perform a single GC iteration")
                .build(),
            gc_reclaimed_total: meter
                .u64_counter("parley_fanout_channels_reclaimed_total")
                .with_description("Total number of stale channels reclaimed by GC")
                .build(),
        }
    }
}

/// Inbox notification: something happened in one of the user's rooms.
/// Carries enough to update a room list without a refetch.
#[derive(Debug, Clone)]
pub struct RoomActivity {
    pub room_id: i64,
    pub message_id: i64,
    pub sender_id: Uuid,
    pub preview: String,
    pub sent_at: i64,
}

/// Delivery seam between the message path and connected gateways. The
/// in-process implementation covers a single node; a broker-backed one
/// would slot in here.
#[async_trait]
pub trait Fanout: Send + Sync + std::fmt::Debug {
    /// Subscribes to full message frames for one room.
    async fn subscribe_room(&self, room_id: i64) -> broadcast::Receiver<Message>;

    /// Subscribes to activity notifications covering all of a user's rooms.
    async fn subscribe_user(&self, user_id: Uuid) -> broadcast::Receiver<RoomActivity>;

    /// Publishes a committed message to its room topic and to both
    /// participants' inbox topics. Best effort: subscribers may be absent
    /// and slow consumers may observe lag.
    async fn publish(&self, room: &Room, message: &Message, preview: String);
}

#[derive(Debug)]
pub struct BroadcastFanout {
    rooms: Arc<DashMap<i64, broadcast::Sender<Message>>>,
    users: Arc<DashMap<Uuid, broadcast::Sender<RoomActivity>>>,
    room_channel_capacity: usize,
    user_channel_capacity: usize,
    metrics: Metrics,
}

impl BroadcastFanout {
    #[must_use]
    pub fn new(config: &FanoutConfig, shutdown: tokio::sync::watch::Receiver<bool>) -> Self {
        let rooms = Arc::new(DashMap::new());
        let users = Arc::new(DashMap::new());
        let metrics = Metrics::new();

        tokio::spawn(
            Self::run_gc(Arc::clone(&rooms), Arc::clone(&users), metrics.clone(), config.gc_interval_secs, shutdown)
                .instrument(tracing::info_span!("fanout_gc")),
        );

        Self {
            rooms,
            users,
            room_channel_capacity: config.room_channel_capacity,
            user_channel_capacity: config.user_channel_capacity,
            metrics,
        }
    }

    async fn run_gc(
        rooms: Arc<DashMap<i64, broadcast::Sender<Message>>>,
        users: Arc<DashMap<Uuid, broadcast::Sender<RoomActivity>>>,
        metrics: Metrics,
        interval_secs: u64,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let start = std::time::Instant::now();
                    let mut reclaimed_this_cycle = 0;

                    rooms.retain(|_, sender| {
                        let active = sender.receiver_count() > 0;
                        if !active {
                            metrics.active_channels.add(-1, &[]);
                            reclaimed_this_cycle += 1;
                        }
                        active
                    });
                    users.retain(|_, sender| {
                        let active = sender.receiver_count() > 0;
                        if !active {
                            metrics.active_channels.add(-1, &[]);
                            reclaimed_this_cycle += 1;
                        }
                        active
                    });

                    let duration = start.elapsed().as_secs_f64();
                    metrics.gc_duration_seconds.record(duration, &[]);
                    if reclaimed_this_cycle > 0 {
                        metrics.gc_reclaimed_total.add(reclaimed_this_cycle, &[]);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }
}

#[async_trait]
impl Fanout for BroadcastFanout {
    #[tracing::instrument(skip(self))]
    async fn subscribe_room(&self, room_id: i64) -> broadcast::Receiver<Message> {
        let tx = self
            .rooms
            .entry(room_id)
            .or_insert_with(|| {
                self.metrics.active_channels.add(1, &[]);
                let (tx, _rx) = broadcast::channel(self.room_channel_capacity);
                tx
            })
            .value()
            .clone();

        tx.subscribe()
    }

    #[tracing::instrument(skip(self))]
    async fn subscribe_user(&self, user_id: Uuid) -> broadcast::Receiver<RoomActivity> {
        let tx = self
            .users
            .entry(user_id)
            .or_insert_with(|| {
                self.metrics.active_channels.add(1, &[]);
                let (tx, _rx) = broadcast::channel(self.user_channel_capacity);
                tx
            })
            .value()
            .clone();

        tx.subscribe()
    }

    #[tracing::instrument(skip(self, room, message, preview), fields(room_id = %message.room_id))]
    async fn publish(&self, room: &Room, message: &Message, preview: String) {
        if let Some(tx) = self.rooms.get(&message.room_id) {
            if tx.send(message.clone()).is_ok() {
                self.metrics.published_total.add(1, &[KeyValue::new("topic", "room")]);
            } else {
                self.metrics.unrouted_total.add(1, &[KeyValue::new("topic", "room")]);
            }
        } else {
            self.metrics.unrouted_total.add(1, &[KeyValue::new("topic", "room")]);
        }

        let activity = RoomActivity {
            room_id: message.room_id,
            message_id: message.id,
            sender_id: message.sender_id,
            preview,
            sent_at: message.sent_at,
        };

        // The sender hears their own sends, which keeps their other devices in sync.
        for user_id in [room.user_lo, room.user_hi] {
            if let Some(tx) = self.users.get(&user_id) {
                if tx.send(activity.clone()).is_ok() {
                    self.metrics.published_total.add(1, &[KeyValue::new("topic", "user")]);
                } else {
                    self.metrics.unrouted_total.add(1, &[KeyValue::new("topic", "user")]);
                }
            } else {
                self.metrics.unrouted_total.add(1, &[KeyValue::new("topic", "user")]);
            }
        }
    }
}
