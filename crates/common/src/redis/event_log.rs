use crate::domain::{
    ClaimInput, ConsumerPending, DomainResult, EntryId, EventLog, GroupStatus, LogEntry,
    PendingSummary, Reading,
};
use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamPendingReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Error code Redis answers with when `XGROUP CREATE` targets an existing group
const BUSYGROUP: &str = "BUSYGROUP";

/// Only entries never delivered to any consumer of the group
const NEW_ENTRIES: &str = ">";

/// Position a new group at the current end of the stream
const STREAM_END: &str = "$";

/// EventLog backed by a Redis stream
#[derive(Clone)]
pub struct RedisEventLog {
    conn: ConnectionManager,
}

impl RedisEventLog {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl EventLog for RedisEventLog {
    #[instrument(skip_all, fields(stream = %stream, site_id = %reading.site_id))]
    async fn append(&self, stream: &str, reading: &Reading) -> DomainResult<EntryId> {
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd(stream, "*", &reading.to_fields())
            .await
            .context("Failed to append reading to stream")?;

        debug!(stream_id = %id, "appended reading");
        Ok(EntryId::new(id))
    }

    async fn create_group(&self, stream: &str, group: &str) -> DomainResult<GroupStatus> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> =
            conn.xgroup_create_mkstream(stream, group, STREAM_END).await;

        match result {
            Ok(()) => Ok(GroupStatus::Created),
            Err(e) if e.code() == Some(BUSYGROUP) => Ok(GroupStatus::AlreadyExists),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to create consumer group {}", group))
                .into()),
        }
    }

    async fn claim(&self, input: ClaimInput) -> DomainResult<Vec<LogEntry>> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default()
            .group(&input.group, &input.consumer)
            .count(input.count)
            .block(input.block.as_millis() as usize);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&input.stream], &[NEW_ENTRIES], &options)
            .await
            .context("Failed to read from consumer group")?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let entries = reply
            .keys
            .into_iter()
            .flat_map(|key| key.ids)
            .map(|stream_id| {
                let mut fields = HashMap::with_capacity(stream_id.map.len());
                for name in stream_id.map.keys() {
                    match stream_id.get::<String>(name) {
                        Some(value) => {
                            fields.insert(name.clone(), value);
                        }
                        None => warn!(
                            stream_id = %stream_id.id,
                            field = %name,
                            "dropping non-string field from stream entry"
                        ),
                    }
                }
                LogEntry::new(EntryId::new(stream_id.id.clone()), fields)
            })
            .collect();

        Ok(entries)
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: &EntryId) -> DomainResult<()> {
        let mut conn = self.conn.clone();
        let acked: i64 = conn
            .xack(stream, group, &[id.as_str()])
            .await
            .context("Failed to acknowledge entry")?;

        if acked == 0 {
            warn!(stream_id = %id, "entry was not pending, nothing acknowledged");
        }
        Ok(())
    }

    async fn pending_summary(&self, stream: &str, group: &str) -> DomainResult<PendingSummary> {
        let mut conn = self.conn.clone();
        let reply: StreamPendingReply = conn
            .xpending(stream, group)
            .await
            .context("Failed to read pending entries")?;

        let summary = match reply {
            StreamPendingReply::Empty => PendingSummary::default(),
            StreamPendingReply::Data(data) => PendingSummary {
                count: data.count as u64,
                lowest_id: Some(EntryId::new(data.start_id)),
                highest_id: Some(EntryId::new(data.end_id)),
                consumers: data
                    .consumers
                    .into_iter()
                    .map(|c| ConsumerPending {
                        name: c.name,
                        pending: c.pending as u64,
                    })
                    .collect(),
            },
        };

        Ok(summary)
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
