use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

/// Configuration for telemetry initialization
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    pub log_level: String,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>, log_level: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: log_level.into(),
            ..Self::default()
        }
    }

    pub fn with_otel(mut self, enabled: bool, endpoint: impl Into<String>) -> Self {
        self.otel_enabled = enabled;
        self.otel_endpoint = endpoint.into();
        self
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "meterflow".to_string(),
            otel_endpoint: "http://localhost:4317".to_string(),
            otel_enabled: false,
            log_level: "info".to_string(),
        }
    }
}

/// Providers returned from telemetry initialization for proper shutdown
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}
