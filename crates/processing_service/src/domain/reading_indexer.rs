use crate::domain::score::score_for;
use common::domain::{DomainError, DomainResult, IndexedReading, LogEntry, SiteIndex};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to a single claimed entry
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    Indexed { site_id: String, score: f64 },
    /// The entry can never be indexed; acknowledging it is the only way to retire it
    Skipped { reason: String },
}

/// Turns log entries into per-site index members
pub struct ReadingIndexer {
    site_index: Arc<dyn SiteIndex>,
}

impl ReadingIndexer {
    pub fn new(site_index: Arc<dyn SiteIndex>) -> Self {
        Self { site_index }
    }

    pub async fn index(&self, entry: &LogEntry) -> DomainResult<IndexOutcome> {
        let reading = match entry.decode() {
            Ok(reading) => reading,
            Err(DomainError::InvalidEntry { entry_id, reason }) => {
                warn!(stream_id = %entry_id, reason = %reason, "skipping entry without a site");
                return Ok(IndexOutcome::Skipped { reason });
            }
            Err(e) => return Err(e),
        };

        let score = score_for(&reading.timestamp, chrono::Utc::now());
        let indexed = IndexedReading::from_reading(&reading, entry.id.clone());

        self.site_index
            .insert(&reading.site_id, score, &indexed)
            .await?;

        debug!(
            stream_id = %entry.id,
            site_id = %reading.site_id,
            score,
            "reading indexed"
        );
        Ok(IndexOutcome::Indexed {
            site_id: reading.site_id,
            score,
        })
    }
}
