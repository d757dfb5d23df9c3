#![allow(dead_code, clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, unreachable_pub)]

use futures::{SinkExt, StreamExt};
use parley_server::api::{MgmtState, ServiceContainer, app_router, mgmt_router};
use parley_server::config::{
    AuthConfig, ChatConfig, Config, FanoutConfig, GatewayConfig, HealthConfig, LogFormat, RateLimitConfig,
    ServerConfig, TelemetryConfig,
};
use parley_server::domain::auth::Claims;
use parley_server::services::health_service::HealthService;
use parley_server::services::listing::{ListingDirectory, StaticListingDirectory};
use parley_server::storage::{self, DbPool};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("parley_server=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("rustls=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    let db_path = std::env::temp_dir().join(format!("parley_test_{}.db", Uuid::new_v4()));

    Config {
        database_url: format!("sqlite://{}", db_path.display()),
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // 0 means let the OS choose
            mgmt_port: 0,
            request_timeout_secs: 5,
            shutdown_timeout_secs: 1,
            trusted_proxies: vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()],
        },
        auth: AuthConfig { jwt_secret: "test_secret".to_string() },
        rate_limit: RateLimitConfig {
            per_second: 10_000,
            burst: 10_000,
            create_per_second: 10_000,
            create_burst: 10_000,
        },
        chat: ChatConfig { message_max_chars: 2000, preview_max_chars: 500, default_page_size: 50, max_page_size: 200 },
        fanout: FanoutConfig { room_channel_capacity: 64, user_channel_capacity: 32, gc_interval_secs: 1 },
        gateway: GatewayConfig { max_room_subscriptions: 8 },
        health: HealthConfig { db_timeout_ms: 500 },
        telemetry: TelemetryConfig { otlp_endpoint: None, log_format: LogFormat::Text },
    }
}

pub struct TestApp {
    pub client: reqwest::Client,
    pub server_url: String,
    pub mgmt_url: String,
    pub ws_url: String,
    pub pool: DbPool,
    pub config: Config,
    pub listings: Arc<StaticListingDirectory>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let pool = storage::init_pool(&config.database_url).await.expect("Failed to open test database");
        storage::run_migrations(&pool).await.expect("Failed to run migrations");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listings = Arc::new(StaticListingDirectory::new());

        let services = ServiceContainer::new(
            &config,
            pool.clone(),
            Arc::clone(&listings) as Arc<dyn ListingDirectory>,
            shutdown_rx.clone(),
        );
        let app = app_router(config.clone(), services, shutdown_rx.clone());
        let mgmt_app =
            mgmt_router(MgmtState { health_service: HealthService::new(pool.clone(), config.health.clone()) });

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = api_listener.local_addr().unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(api_listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self {
            client: reqwest::Client::new(),
            server_url: format!("http://{api_addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            ws_url: format!("ws://{api_addr}/v1/gateway"),
            pool,
            config,
            listings,
            shutdown_tx,
        }
    }

    pub fn mint_token(&self, user_id: Uuid) -> String {
        Claims::new(user_id, Vec::new(), 3600).encode(&self.config.auth.jwt_secret).expect("Failed to mint token")
    }

    pub fn mint_admin_token(&self, user_id: Uuid) -> String {
        Claims::new(user_id, vec!["admin".to_string()], 3600)
            .encode(&self.config.auth.jwt_secret)
            .expect("Failed to mint admin token")
    }

    pub async fn open_room(&self, token: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/rooms", self.server_url))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Opens a room with `counterpart` and returns its id, asserting success.
    pub async fn open_room_with(&self, token: &str, counterpart: Uuid) -> i64 {
        let resp = self.open_room(token, &json!({ "counterpart_id": counterpart })).await;
        assert!(resp.status().is_success(), "Room open failed: {}", resp.status());
        resp.json::<Value>().await.unwrap()["room_id"].as_i64().unwrap()
    }

    pub async fn send_message(&self, token: &str, room_id: i64, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/rooms/{room_id}/messages", self.server_url))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Sends a text message and returns the response body, asserting 201.
    pub async fn send_text(&self, token: &str, room_id: i64, text: &str) -> Value {
        let resp = self.send_message(token, room_id, &json!({ "content": text })).await;
        assert_eq!(resp.status(), 201, "Message send failed");
        resp.json().await.unwrap()
    }

    pub async fn list_rooms(&self, token: &str) -> Vec<Value> {
        let resp = self.client.get(format!("{}/v1/rooms", self.server_url)).bearer_auth(token).send().await.unwrap();
        assert_eq!(resp.status(), 200, "Room list failed");
        resp.json().await.unwrap()
    }

    pub async fn list_messages(&self, token: &str, room_id: i64, query: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/v1/rooms/{room_id}/messages{query}", self.server_url))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn mark_read(&self, token: &str, room_id: i64) -> Value {
        let resp = self
            .client
            .patch(format!("{}/v1/rooms/{room_id}/read", self.server_url))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "Mark read failed");
        resp.json().await.unwrap()
    }

    pub async fn delete_room(&self, token: &str, room_id: i64) -> reqwest::Response {
        self.client
            .delete(format!("{}/v1/rooms/{room_id}", self.server_url))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn connect_ws(&self, token: &str) -> WsClient {
        let (stream, _) =
            connect_async(format!("{}?token={token}", self.ws_url)).await.expect("WebSocket handshake failed");
        WsClient { stream }
    }
}

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl WsClient {
    pub async fn send_json(&mut self, value: &Value) {
        self.stream.send(WsMessage::Text(value.to_string().into())).await.expect("WebSocket send failed");
    }

    /// Next text frame as JSON, or `None` if the timeout elapses or the
    /// connection closes first.
    pub async fn recv_json(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.checked_duration_since(tokio::time::Instant::now())?;
            match tokio::time::timeout(remaining, self.stream.next()).await {
                Ok(Some(Ok(WsMessage::Text(text)))) => {
                    return Some(serde_json::from_str(&text).expect("Frame was not valid JSON"));
                }
                Ok(Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_)))) => {}
                _ => return None,
            }
        }
    }

    /// Asserts the next frame has the expected `type` tag and returns it.
    pub async fn expect_frame(&mut self, frame_type: &str) -> Value {
        let frame = self
            .recv_json(Duration::from_secs(2))
            .await
            .unwrap_or_else(|| panic!("Expected `{frame_type}` frame, got nothing"));
        assert_eq!(frame["type"], frame_type, "Unexpected frame: {frame}");
        frame
    }

    pub async fn recv_raw_timeout(&mut self, timeout: Duration) -> Option<Result<WsMessage, tokio_tungstenite::tungstenite::Error>> {
        tokio::time::timeout(timeout, self.stream.next()).await.ok().flatten()
    }
}
