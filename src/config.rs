use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "PARLEY_DATABASE_URL")]
    pub database_url: String,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub chat: ChatConfig,

    #[command(flatten)]
    pub fanout: FanoutConfig,

    #[command(flatten)]
    pub gateway: GatewayConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "PARLEY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the public API
    #[arg(long, env = "PARLEY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management endpoints (health probes)
    #[arg(long, env = "PARLEY_MGMT_PORT", default_value_t = 3001)]
    pub mgmt_port: u16,

    /// Per-request timeout in seconds
    #[arg(long, env = "PARLEY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// How long to wait for background tasks to drain on shutdown
    #[arg(long, env = "PARLEY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "PARLEY_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for verifying JWTs minted by the identity service
    #[arg(long, env = "PARLEY_JWT_SECRET")]
    pub jwt_secret: String,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "PARLEY_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "PARLEY_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for room creation
    #[arg(long, env = "PARLEY_CREATE_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub create_per_second: u32,

    /// Burst allowance for room creation
    #[arg(long, env = "PARLEY_CREATE_RATE_LIMIT_BURST", default_value_t = 5)]
    pub create_burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct ChatConfig {
    /// Maximum length of a message body in characters
    #[arg(long, env = "PARLEY_MESSAGE_MAX_CHARS", default_value_t = 2000)]
    pub message_max_chars: usize,

    /// Maximum length of the room preview snippet in characters
    #[arg(long, env = "PARLEY_PREVIEW_MAX_CHARS", default_value_t = 500)]
    pub preview_max_chars: usize,

    /// Page size for message history when the client does not ask for one
    #[arg(long, env = "PARLEY_DEFAULT_PAGE_SIZE", default_value_t = 50)]
    pub default_page_size: i64,

    /// Upper bound on the message history page size
    #[arg(long, env = "PARLEY_MAX_PAGE_SIZE", default_value_t = 200)]
    pub max_page_size: i64,
}

#[derive(Clone, Debug, Args)]
pub struct FanoutConfig {
    /// Capacity of each per-room broadcast channel
    #[arg(long, env = "PARLEY_ROOM_CHANNEL_CAPACITY", default_value_t = 64)]
    pub room_channel_capacity: usize,

    /// Capacity of each per-user activity channel
    #[arg(long, env = "PARLEY_USER_CHANNEL_CAPACITY", default_value_t = 32)]
    pub user_channel_capacity: usize,

    /// How often to sweep subscriber-less channels
    #[arg(long, env = "PARLEY_FANOUT_GC_INTERVAL_SECS", default_value_t = 60)]
    pub gc_interval_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct GatewayConfig {
    /// Maximum number of rooms a single connection may subscribe to
    #[arg(long, env = "PARLEY_MAX_ROOM_SUBSCRIPTIONS", default_value_t = 64)]
    pub max_room_subscriptions: usize,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the database readiness probe in milliseconds
    #[arg(long, env = "PARLEY_HEALTH_DB_TIMEOUT_MS", default_value_t = 500)]
    pub db_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint; telemetry export is disabled when unset
    #[arg(long, env = "PARLEY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "PARLEY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}
