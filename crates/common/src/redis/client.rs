use crate::domain::{EventLog, SiteIndex};
use crate::redis::{RedisEventLog, RedisSiteIndex};
use crate::retry::{retry_with_backoff, RetryPolicy};
use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::info;

/// A single managed connection to the Redis server holding the stream and the site indexes
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
}

impl RedisClient {
    pub fn url(host: &str, port: u16) -> String {
        format!("redis://{}:{}", host, port)
    }

    pub async fn connect(url: &str) -> Result<Self> {
        info!(url = %url, "Connecting to Redis");

        let client = redis::Client::open(url).context("Invalid Redis URL")?;
        let mut manager = client
            .get_connection_manager()
            .await
            .context("Failed to connect to Redis")?;

        redis::cmd("PING")
            .query_async::<String>(&mut manager)
            .await
            .context("Redis did not answer PING")?;

        info!("Successfully connected to Redis");
        Ok(Self { manager })
    }

    /// Connect, retrying with exponential backoff until the policy is exhausted
    pub async fn connect_with_retry(url: &str, policy: &RetryPolicy) -> Result<Self> {
        retry_with_backoff("redis_connect", policy, || Self::connect(url)).await
    }

    /// Create an EventLog trait object over this connection
    pub fn create_event_log(&self) -> Arc<dyn EventLog> {
        Arc::new(RedisEventLog::new(self.manager.clone()))
    }

    /// Create a SiteIndex trait object over this connection
    pub fn create_site_index(&self) -> Arc<dyn SiteIndex> {
        Arc::new(RedisSiteIndex::new(self.manager.clone()))
    }

    pub async fn close(self) {
        info!("Closing Redis connection");
        // The multiplexed connection closes once the last handle is dropped
    }
}
