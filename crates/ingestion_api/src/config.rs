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
    /// Redis host holding the readings stream
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Stream readings are appended to
    #[serde(default = "default_stream_name")]
    pub stream_name: String,

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

    /// Seconds in-flight requests get to complete after a shutdown signal
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
    3000
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "ingestion-api".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("METERFLOW"))
            .build()?
            .try_deserialize()
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::remove_var("METERFLOW_HTTP_PORT");
            std::env::remove_var("METERFLOW_STREAM_NAME");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.stream_name, "energy_readings");
        assert_eq!(config.http_addr(), "0.0.0.0:3000");
        assert_eq!(config.startup_retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("METERFLOW_HTTP_PORT", "8080");
            std::env::set_var("METERFLOW_STREAM_NAME", "readings_test");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.stream_name, "readings_test");

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::remove_var("METERFLOW_HTTP_PORT");
            std::env::remove_var("METERFLOW_STREAM_NAME");
        }
    }
}
