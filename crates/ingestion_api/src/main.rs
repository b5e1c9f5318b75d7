use common::jsonschema::ReadingValidator;
use common::redis::RedisClient;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use ingestion_api::config::ServiceConfig;
use ingestion_api::{IngestionApi, ReadingService};
use meterflow_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(
        &TelemetryConfig::new(config.otel_service_name.clone(), config.log_level.clone())
            .with_otel(config.otel_enabled, config.otel_endpoint.clone()),
    ) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        stream = %config.stream_name,
        otel_enabled = config.otel_enabled,
        "Starting ingestion-api service"
    );
    debug!("Configuration: {:?}", config);

    let redis_url = RedisClient::url(&config.redis_host, config.redis_port);
    let redis = match RedisClient::connect_with_retry(&redis_url, &config.startup_retry_policy()).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to Redis: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let validator = match ReadingValidator::new() {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to compile reading schema: {:#}", e);
            std::process::exit(1);
        }
    };

    let reading_service = Arc::new(ReadingService::new(
        redis.create_event_log(),
        validator,
        config.stream_name.clone(),
    ));
    let ingestion_api = IngestionApi::new(reading_service, config.http_addr());

    let runner = Runner::new()
        .with_named_process("ingestion_api", ingestion_api.into_runner_process())
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            redis.close().await;
            shutdown_telemetry(telemetry_providers);
            info!("Cleanup complete");
            Ok(())
        })
        .with_drain_timeout(Duration::from_secs(config.shutdown_timeout_secs))
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}
