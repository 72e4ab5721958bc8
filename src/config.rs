use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "TELEREACH_DATABASE_URL")]
    pub database_url: String,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub messaging: MessagingConfig,

    #[command(flatten)]
    pub pubsub: PubSubConfig,

    #[command(flatten)]
    pub notifications: NotificationConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(flatten)]
    pub health: HealthConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "TELEREACH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "TELEREACH_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management (health probe) listener
    #[arg(long, env = "TELEREACH_MGMT_PORT", default_value_t = 3001)]
    pub mgmt_port: u16,

    /// Seconds to wait for background tasks during shutdown
    #[arg(long, env = "TELEREACH_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "TELEREACH_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key shared with the session service for JWT verification
    #[arg(long, env = "TELEREACH_JWT_SECRET")]
    pub jwt_secret: String,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed per client IP
    #[arg(long, env = "TELEREACH_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance per client IP
    #[arg(long, env = "TELEREACH_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct MessagingConfig {
    /// Maximum size of an encrypted file attachment in bytes (Default: 10MB)
    #[arg(long, env = "TELEREACH_MAX_FILE_SIZE_BYTES", default_value_t = 10_485_760)]
    pub max_file_size_bytes: usize,
}

#[derive(Clone, Debug, Args)]
pub struct PubSubConfig {
    /// Redis connection URL for realtime fan-out
    #[arg(long, env = "TELEREACH_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub url: String,

    /// Minimum reconnect backoff in seconds
    #[arg(long, env = "TELEREACH_PUBSUB_MIN_BACKOFF_SECS", default_value_t = 1)]
    pub min_backoff_secs: u64,

    /// Maximum reconnect backoff in seconds
    #[arg(long, env = "TELEREACH_PUBSUB_MAX_BACKOFF_SECS", default_value_t = 30)]
    pub max_backoff_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct NotificationConfig {
    /// How often to reclaim notification channels with no subscribers
    #[arg(long, env = "TELEREACH_NOTIFICATION_GC_INTERVAL_SECS", default_value_t = 60)]
    pub gc_interval_secs: u64,

    /// Capacity of the shared pub/sub receive channel
    #[arg(long, env = "TELEREACH_NOTIFICATION_GLOBAL_CHANNEL_CAPACITY", default_value_t = 256)]
    pub global_channel_capacity: usize,

    /// Capacity of each per-user notification channel
    #[arg(long, env = "TELEREACH_NOTIFICATION_USER_CHANNEL_CAPACITY", default_value_t = 16)]
    pub user_channel_capacity: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP endpoint for trace and metric export; exports are disabled when unset
    #[arg(long, env = "TELEREACH_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "TELEREACH_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the readiness database probe in milliseconds
    #[arg(long, env = "TELEREACH_HEALTH_DB_TIMEOUT_MS", default_value_t = 1000)]
    pub db_timeout_ms: u64,

    /// Timeout for the readiness pub/sub probe in milliseconds
    #[arg(long, env = "TELEREACH_HEALTH_PUBSUB_TIMEOUT_MS", default_value_t = 1000)]
    pub pubsub_timeout_ms: u64,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}
