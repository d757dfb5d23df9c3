use crate::api::rate_limit::log_rate_limit_events;
use crate::config::Config;
use crate::services::fanout::{BroadcastFanout, Fanout};
use crate::services::gateway::GatewayService;
use crate::services::health_service::HealthService;
use crate::services::listing::ListingDirectory;
use crate::services::message_service::MessageService;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::room_service::RoomService;
use crate::storage::DbPool;
use crate::storage::message_repo::MessageRepository;
use crate::storage::room_repo::RoomRepository;
use axum::body::Body;
use axum::http::Request;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod docs;
pub mod gateway;
pub mod health;
pub mod middleware;
pub mod rate_limit;
pub mod rooms;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub room_service: RoomService,
    pub message_service: MessageService,
    pub gateway_service: GatewayService,
    pub rate_limit_service: RateLimitService,
    pub shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub pool: DbPool,
    pub room_service: RoomService,
    pub message_service: MessageService,
    pub gateway_service: GatewayService,
    pub rate_limit_service: RateLimitService,
}

impl ServiceContainer {
    /// Wires repositories, fanout, and services onto one pool. The shutdown
    /// receiver reaches the fanout GC task so it stops with the server.
    #[must_use]
    pub fn new(
        config: &Config,
        pool: DbPool,
        listings: Arc<dyn ListingDirectory>,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> Self {
        let rooms = RoomRepository::new();
        let messages = MessageRepository::new();
        let fanout: Arc<dyn Fanout> = Arc::new(BroadcastFanout::new(&config.fanout, shutdown_rx));

        let room_service = RoomService::new(pool.clone(), rooms.clone(), messages.clone(), listings);
        let message_service =
            MessageService::new(pool.clone(), rooms, messages, Arc::clone(&fanout), config.chat.clone());
        let gateway_service = GatewayService::new(room_service.clone(), fanout, config.gateway.clone());
        let rate_limit_service = RateLimitService::new(config.server.trusted_proxies.clone());

        Self { pool, room_service, message_service, gateway_service, rate_limit_service }
    }
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(
    config: Config,
    services: ServiceContainer,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Router {
    let std_interval_ns = 1_000_000_000 / config.rate_limit.per_second.max(1);
    let standard_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(std_interval_ns))
            .burst_size(config.rate_limit.burst)
            .key_extractor(services.rate_limit_service.extractor.clone())
            .finish()
            .expect("Failed to build standard rate limiter config"),
    );

    // Creation tier: stricter limits, since every distinct counterpart mints a row
    let create_interval_ns = 1_000_000_000 / config.rate_limit.create_per_second.max(1);
    let create_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_nanosecond(u64::from(create_interval_ns))
            .burst_size(config.rate_limit.create_burst)
            .key_extractor(services.rate_limit_service.extractor.clone())
            .finish()
            .expect("Failed to build creation rate limiter config"),
    );

    let request_timeout = Duration::from_secs(config.server.request_timeout_secs);

    let state = AppState {
        config,
        room_service: services.room_service,
        message_service: services.message_service,
        gateway_service: services.gateway_service,
        rate_limit_service: services.rate_limit_service,
        shutdown_rx,
    };

    let create_routes = Router::new().route("/rooms", post(rooms::create_room)).layer(GovernorLayer::new(create_conf));

    let api_routes = Router::new()
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{roomId}", get(rooms::get_room))
        .route("/rooms/{roomId}", delete(rooms::delete_room))
        .route("/rooms/{roomId}/messages", get(rooms::list_messages))
        .route("/rooms/{roomId}/messages", post(rooms::send_message))
        .route("/rooms/{roomId}/read", patch(rooms::mark_read))
        .route("/gateway", get(gateway::websocket_handler))
        .layer(GovernorLayer::new(standard_conf));

    Router::new()
        .route("/openapi.yaml", get(docs::openapi_yaml))
        .nest("/v1", create_routes.merge(api_routes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(from_fn_with_state(state.clone(), log_rate_limit_events))
        .layer(PropagateRequestIdLayer::new(axum::http::HeaderName::from_static("x-request-id")))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .map(|id| id.header_value().to_str().unwrap_or_default())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %request.uri().path(),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(
            axum::http::HeaderName::from_static("x-request-id"),
            middleware::MakeRequestUuidOrHeader,
        ))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
