use common::redis::RedisClient;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use meterflow_runner::Runner;
use processing_service::config::ServiceConfig;
use processing_service::{
    ConsumerGroupCoordinator, ProcessingService, QueryService, QueryState, ReadingIndexer,
    StreamProcessor, StreamProcessorConfig,
};
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
        group = %config.group_name,
        consumer = %config.consumer_name,
        "Starting processing-service"
    );
    debug!("Configuration: {:?}", config);

    let (stream_client, index_client) = match initialize_redis(&config).await {
        Ok(clients) => clients,
        Err(e) => {
            error!("Failed to initialize Redis: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    // Blocking claims get their own connection so HTTP handlers never queue behind them
    let stream_log = stream_client.create_event_log();
    let probe_log = index_client.create_event_log();
    let site_index = index_client.create_site_index();

    let coordinator = ConsumerGroupCoordinator::new(probe_log.clone());
    if let Err(e) = coordinator
        .ensure_group(&config.stream_name, &config.group_name)
        .await
    {
        error!("Failed to ensure consumer group: {}", e);
        shutdown_telemetry(telemetry_providers);
        std::process::exit(1);
    }

    let processor = StreamProcessor::new(
        stream_log,
        ReadingIndexer::new(site_index.clone()),
        StreamProcessorConfig {
            stream: config.stream_name.clone(),
            group: config.group_name.clone(),
            consumer: config.consumer_name.clone(),
            batch_size: config.batch_size,
            block_timeout: Duration::from_millis(config.block_timeout_ms),
            claim_retry_delay: Duration::from_millis(config.claim_retry_delay_ms),
        },
    );

    let query_state = QueryState {
        query: Arc::new(QueryService::new(site_index)),
        event_log: probe_log,
        stream: config.stream_name.clone(),
        group: config.group_name.clone(),
        consumer: config.consumer_name.clone(),
    };

    let processing_service = ProcessingService::new(processor, query_state, config.http_addr());

    let mut runner = Runner::new();
    for (name, process) in processing_service.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    // Closers only run once every process has stopped, so the stream connection outlives the loop
    runner = runner
        .with_closer(move || async move {
            info!("Running cleanup tasks...");
            stream_client.close().await;
            index_client.close().await;
            shutdown_telemetry(telemetry_providers);
            info!("Cleanup complete");
            Ok(())
        })
        .with_drain_timeout(Duration::from_secs(config.shutdown_timeout_secs))
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

async fn initialize_redis(config: &ServiceConfig) -> anyhow::Result<(RedisClient, RedisClient)> {
    let url = RedisClient::url(&config.redis_host, config.redis_port);
    let policy = config.startup_retry_policy();

    info!("Initializing Redis stream connection...");
    let stream_client = RedisClient::connect_with_retry(&url, &policy).await?;

    info!("Initializing Redis index connection...");
    let index_client = RedisClient::connect_with_retry(&url, &policy).await?;

    Ok((stream_client, index_client))
}
