use crate::domain::{site_key, DomainResult, IndexedReading, SiteIndex};
use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, instrument, warn};

/// SiteIndex backed by one Redis sorted set per site, members stored as JSON
#[derive(Clone)]
pub struct RedisSiteIndex {
    conn: ConnectionManager,
}

impl RedisSiteIndex {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SiteIndex for RedisSiteIndex {
    #[instrument(skip(self, reading), fields(stream_id = %reading.source_entry_id))]
    async fn insert(&self, site_id: &str, score: f64, reading: &IndexedReading) -> DomainResult<()> {
        let member = serde_json::to_string(reading).context("Failed to encode indexed reading")?;

        let mut conn = self.conn.clone();
        let added: i64 = conn
            .zadd(site_key(site_id), member, score)
            .await
            .context("Failed to insert reading into site index")?;

        if added == 0 {
            debug!(site_id = %site_id, "reading already indexed, score refreshed");
        }
        Ok(())
    }

    async fn list_descending(&self, site_id: &str) -> DomainResult<Vec<IndexedReading>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrevrange(site_key(site_id), 0, -1)
            .await
            .context("Failed to read site index")?;

        let readings = members
            .iter()
            .filter_map(|member| match serde_json::from_str::<IndexedReading>(member) {
                Ok(reading) => Some(reading),
                Err(e) => {
                    warn!(site_id = %site_id, error = %e, "skipping undecodable index member");
                    None
                }
            })
            .collect();

        Ok(readings)
    }

    async fn ping(&self) -> DomainResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis did not answer PING")?;
        Ok(())
    }
}
