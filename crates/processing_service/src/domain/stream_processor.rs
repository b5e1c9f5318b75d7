use crate::domain::reading_indexer::{IndexOutcome, ReadingIndexer};
use common::domain::{ClaimInput, DomainError, EventLog, LogEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

/// Settings for one stream processor instance
#[derive(Debug, Clone)]
pub struct StreamProcessorConfig {
    pub stream: String,
    pub group: String,
    pub consumer: String,
    pub batch_size: usize,
    pub block_timeout: Duration,
    /// Fixed delay after a failed claim before claiming again
    pub claim_retry_delay: Duration,
}

/// Per-batch tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub acknowledged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Claims never-delivered entries for this consumer, indexes each and acknowledges it once
/// the index insert succeeded. Failed entries stay pending.
pub struct StreamProcessor {
    event_log: Arc<dyn EventLog>,
    indexer: ReadingIndexer,
    config: StreamProcessorConfig,
}

impl StreamProcessor {
    pub fn new(event_log: Arc<dyn EventLog>, indexer: ReadingIndexer, config: StreamProcessorConfig) -> Self {
        Self {
            event_log,
            indexer,
            config,
        }
    }

    pub fn consumer(&self) -> &str {
        &self.config.consumer
    }

    /// Claim and process batches until cancelled.
    ///
    /// A claim in progress is allowed to complete (bounded by the block timeout) and its batch
    /// is fully processed before the loop exits.
    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(
            stream = %self.config.stream,
            group = %self.config.group,
            consumer = %self.config.consumer,
            batch_size = self.config.batch_size,
            "starting stream processor"
        );

        while !ctx.is_cancelled() {
            match self.event_log.claim(self.claim_input()).await {
                Ok(entries) if entries.is_empty() => {
                    trace!("no new entries within block timeout");
                }
                Ok(entries) => {
                    self.process_batch(entries).await;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_ms = self.config.claim_retry_delay.as_millis() as u64,
                        "failed to claim entries"
                    );
                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(self.config.claim_retry_delay) => {}
                    }
                }
            }
        }

        info!(consumer = %self.config.consumer, "stream processor stopped");
        Ok(())
    }

    fn claim_input(&self) -> ClaimInput {
        ClaimInput {
            stream: self.config.stream.clone(),
            group: self.config.group.clone(),
            consumer: self.config.consumer.clone(),
            count: self.config.batch_size,
            block: self.config.block_timeout,
        }
    }

    /// Process every entry independently; one failure never stalls the rest.
    #[instrument(skip(self, entries), fields(batch_size = entries.len()))]
    pub async fn process_batch(&self, entries: Vec<LogEntry>) -> BatchReport {
        let mut report = BatchReport::default();

        for entry in &entries {
            let outcome = match self.indexer.index(entry).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log_entry_failure(entry, &e);
                    report.failed += 1;
                    continue;
                }
            };

            if let Err(e) = self
                .event_log
                .acknowledge(&self.config.stream, &self.config.group, &entry.id)
                .await
            {
                // Indexed but still pending; a later reclaim will index it again
                error!(stream_id = %entry.id, error = %e, "failed to acknowledge entry");
                report.failed += 1;
                continue;
            }

            match outcome {
                IndexOutcome::Indexed { .. } => report.acknowledged += 1,
                IndexOutcome::Skipped { .. } => report.skipped += 1,
            }
        }

        debug!(
            acknowledged = report.acknowledged,
            skipped = report.skipped,
            failed = report.failed,
            "batch processed"
        );
        report
    }
}

fn log_entry_failure(entry: &LogEntry, err: &DomainError) {
    match err {
        DomainError::Processing { reason, .. } => {
            warn!(stream_id = %entry.id, reason = %reason, "entry left pending: cannot be decoded")
        }
        other => error!(stream_id = %entry.id, error = %other, "entry left pending: indexing failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{EntryId, MockEventLog, Reading};
    use common::memory::{MemoryEventLog, MemorySiteIndex};
    use std::collections::HashMap;

    const STREAM: &str = "energy_readings";
    const GROUP: &str = "processing_group";

    fn config() -> StreamProcessorConfig {
        StreamProcessorConfig {
            stream: STREAM.to_string(),
            group: GROUP.to_string(),
            consumer: "consumer-test".to_string(),
            batch_size: 10,
            block_timeout: Duration::from_millis(50),
            claim_retry_delay: Duration::from_millis(2000),
        }
    }

    fn reading(site: &str, ts: &str) -> Reading {
        Reading {
            site_id: site.to_string(),
            device_id: "meter-42".to_string(),
            power_reading: 1500.5,
            timestamp: ts.to_string(),
        }
    }

    async fn setup() -> (Arc<MemoryEventLog>, Arc<MemorySiteIndex>, StreamProcessor) {
        let log = Arc::new(MemoryEventLog::new());
        let index = Arc::new(MemorySiteIndex::new());
        log.create_group(STREAM, GROUP).await.unwrap();

        let processor = StreamProcessor::new(log.clone(), ReadingIndexer::new(index.clone()), config());
        (log, index, processor)
    }

    async fn claim_all(log: &MemoryEventLog) -> Vec<LogEntry> {
        log.claim(ClaimInput {
            stream: STREAM.to_string(),
            group: GROUP.to_string(),
            consumer: "consumer-test".to_string(),
            count: 100,
            block: Duration::ZERO,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_batch_indexes_and_acknowledges_each_entry() {
        let (log, index, processor) = setup().await;
        log.append(STREAM, &reading("site-a", "2024-01-15T10:30:00Z")).await.unwrap();
        log.append(STREAM, &reading("site-b", "2024-01-15T10:31:00Z")).await.unwrap();

        let report = processor.process_batch(claim_all(&log).await).await;

        assert_eq!(report.acknowledged, 2);
        assert_eq!(index.site_len("site-a"), 1);
        assert_eq!(index.site_len("site-b"), 1);
        assert!(log.pending_ids(STREAM, GROUP).is_empty());
    }

    #[tokio::test]
    async fn test_poisoned_entry_does_not_stall_batch() {
        let (log, index, processor) = setup().await;
        log.append(STREAM, &reading("site-a", "2024-01-15T10:30:00Z")).await.unwrap();
        let poisoned = log.append_raw(
            STREAM,
            HashMap::from([
                ("site_id".to_string(), "site-a".to_string()),
                ("power_reading".to_string(), "abc".to_string()),
            ]),
        );
        log.append(STREAM, &reading("site-a", "2024-01-15T10:32:00Z")).await.unwrap();

        let report = processor.process_batch(claim_all(&log).await).await;

        assert_eq!(report, BatchReport { acknowledged: 2, skipped: 0, failed: 1 });
        assert_eq!(index.site_len("site-a"), 2);
        assert_eq!(log.pending_ids(STREAM, GROUP), vec![poisoned]);
    }

    #[tokio::test]
    async fn test_entry_without_site_is_acknowledged_and_skipped() {
        let (log, _index, processor) = setup().await;
        log.append_raw(
            STREAM,
            HashMap::from([("device_id".to_string(), "meter-42".to_string())]),
        );

        let report = processor.process_batch(claim_all(&log).await).await;

        assert_eq!(report.skipped, 1);
        assert!(log.pending_ids(STREAM, GROUP).is_empty());
    }

    #[tokio::test]
    async fn test_index_failure_leaves_entry_pending_until_reclaimed() {
        let (log, index, processor) = setup().await;
        let id = log.append(STREAM, &reading("site-a", "2024-01-15T10:30:00Z")).await.unwrap();

        index.set_failing(true);
        let report = processor.process_batch(claim_all(&log).await).await;
        assert_eq!(report.failed, 1);
        assert_eq!(log.pending_ids(STREAM, GROUP), vec![id.clone()]);

        index.set_failing(false);
        let reclaimed = log.reclaim_pending(STREAM, GROUP, "consumer-test");
        assert_eq!(reclaimed[0].id, id);

        let report = processor.process_batch(reclaimed).await;
        assert_eq!(report.acknowledged, 1);
        assert_eq!(index.site_len("site-a"), 1);
        assert!(log.pending_ids(STREAM, GROUP).is_empty());
    }

    #[tokio::test]
    async fn test_ack_failure_counts_as_failed() {
        let mut log = MockEventLog::new();
        log.expect_acknowledge()
            .times(1)
            .return_once(|_, _, _| Err(DomainError::Dependency(anyhow::anyhow!("reset"))));
        let index = Arc::new(MemorySiteIndex::new());
        let processor = StreamProcessor::new(Arc::new(log), ReadingIndexer::new(index.clone()), config());

        let entry = LogEntry::from_reading(EntryId::new("1-0"), &reading("site-a", "t"));
        let report = processor.process_batch(vec![entry]).await;

        assert_eq!(report.failed, 1);
        assert_eq!(index.site_len("site-a"), 1);
    }

    #[tokio::test]
    async fn test_run_processes_until_cancelled() {
        let (log, index, processor) = setup().await;
        let processor = Arc::new(processor);
        let ctx = CancellationToken::new();

        let handle = {
            let processor = processor.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { processor.run(ctx).await })
        };

        log.append(STREAM, &reading("site-a", "2024-01-15T10:30:00Z")).await.unwrap();
        for _ in 0..100 {
            if index.site_len("site-a") == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(index.site_len("site-a"), 1);

        ctx.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_claim_failure_backoff_is_interrupted_by_shutdown() {
        let mut log = MockEventLog::new();
        log.expect_claim()
            .returning(|_| Err(DomainError::Dependency(anyhow::anyhow!("connection refused"))));
        let processor = StreamProcessor::new(
            Arc::new(log),
            ReadingIndexer::new(Arc::new(MemorySiteIndex::new())),
            config(),
        );
        let ctx = CancellationToken::new();

        let run = processor.run(ctx.clone());
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctx.cancel();
        };

        let (result, ()) = tokio::time::timeout(Duration::from_secs(1), async { tokio::join!(run, cancel) })
            .await
            .unwrap();
        assert!(result.is_ok());
    }
}
