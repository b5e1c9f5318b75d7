use common::retry::RetryPolicy;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Redis configuration
    /// Redis host holding the readings stream and the site indexes
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Stream readings are claimed from
    #[serde(default = "default_stream_name")]
    pub stream_name: String,

    /// Consumer group shared by all replicas
    #[serde(default = "default_group_name")]
    pub group_name: String,

    /// Consumer name, unique per replica
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Maximum entries claimed per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How long a claim waits for new entries, in milliseconds
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,

    /// Delay after a failed claim, in milliseconds
    #[serde(default = "default_claim_retry_delay_ms")]
    pub claim_retry_delay_ms: u64,

    /// Connection attempts before startup is abandoned
    #[serde(default = "default_startup_max_attempts")]
    pub startup_max_attempts: u32,

    /// Delay before the second connection attempt, doubled for each further attempt
    #[serde(default = "default_startup_base_delay_ms")]
    pub startup_base_delay_ms: u64,

    // HTTP configuration
    /// HTTP listen host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP listen port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Seconds the in-flight batch gets to finish after a shutdown signal
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    // Telemetry configuration
    /// Whether traces and logs are exported over OTLP
    #[serde(default)]
    pub otel_enabled: bool,

    /// OTLP collector endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Service name reported to the collector
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_redis_host() -> String {
    "localhost".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_stream_name() -> String {
    "energy_readings".to_string()
}

fn default_group_name() -> String {
    "processing_group".to_string()
}

/// `consumer-<host>`, stable across restarts on the same machine.
///
/// `HOSTNAME` wins over the OS host name so containers can pin it. A random suffix is used
/// only when neither is available.
fn default_consumer_name() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            gethostname::gethostname()
                .into_string()
                .ok()
                .filter(|h| !h.trim().is_empty())
        })
        .unwrap_or_else(|| xid::new().to_string());
    format!("consumer-{}", host)
}

fn default_batch_size() -> usize {
    10
}

fn default_block_timeout_ms() -> u64 {
    5000
}

fn default_claim_retry_delay_ms() -> u64 {
    2000
}

fn default_startup_max_attempts() -> u32 {
    10
}

fn default_startup_base_delay_ms() -> u64 {
    1000
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    3001
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "processing-service".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("METERFLOW"))
            .build()?
            .try_deserialize()?;

        // BLOCK 0 waits forever, so the claim loop would never observe shutdown
        if config.block_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "block_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn startup_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.startup_max_attempts,
            Duration::from_millis(self.startup_base_delay_ms),
        )
    }
}
