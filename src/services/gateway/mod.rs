pub(crate) mod session;

use crate::config::GatewayConfig;
use crate::domain::auth::Principal;
use crate::services::fanout::Fanout;
use crate::services::gateway::session::Session;
use crate::services::room_service::RoomService;
use axum::extract::ws::WebSocket;
use opentelemetry::{
    global,
    metrics::{Counter, UpDownCounter},
};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub(crate) struct Metrics {
    pub(crate) active_connections: UpDownCounter<i64>,
    pub(crate) room_subscriptions: UpDownCounter<i64>,
    pub(crate) frames_lagged_total: Counter<u64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("parley-server");
        Self {
            active_connections: meter
                .i64_up_down_counter("parley_gateway_active_connections")
                .with_description("Number of open gateway connections")
                .build(),
            room_subscriptions: meter
                .i64_up_down_counter("parley_gateway_room_subscriptions")
                .with_description("Number of live room subscriptions across all connections")
                .build(),
            frames_lagged_total: meter
                .u64_counter("parley_gateway_frames_lagged_total")
                .with_description("Total frames dropped because a session fell behind its channels")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct GatewayService {
    room_service: RoomService,
    fanout: Arc<dyn Fanout>,
    config: GatewayConfig,
    metrics: Metrics,
}

impl GatewayService {
    #[must_use]
    pub fn new(room_service: RoomService, fanout: Arc<dyn Fanout>, config: GatewayConfig) -> Self {
        Self { room_service, fanout, config, metrics: Metrics::new() }
    }

    pub async fn handle_socket(
        &self,
        socket: WebSocket,
        principal: Principal,
        request_id: String,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let session = Session {
            user_id: principal.user_id,
            request_id,
            socket,
            room_service: self.room_service.clone(),
            fanout: Arc::clone(&self.fanout),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            shutdown_rx,
        };

        session.run().await;
    }
}
