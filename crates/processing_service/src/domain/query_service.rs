use common::domain::{DomainError, DomainResult, IndexedReading, SiteIndex};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A reading as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingView {
    pub device_id: String,
    pub power_reading: f64,
    pub timestamp: String,
}

impl From<IndexedReading> for ReadingView {
    fn from(reading: IndexedReading) -> Self {
        Self {
            device_id: reading.device_id,
            power_reading: reading.power_reading,
            timestamp: reading.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteReadings {
    pub site_id: String,
    pub count: usize,
    pub readings: Vec<ReadingView>,
}

/// Read-only access to the per-site index
pub struct QueryService {
    site_index: Arc<dyn SiteIndex>,
}

impl QueryService {
    pub fn new(site_index: Arc<dyn SiteIndex>) -> Self {
        Self { site_index }
    }

    /// Every reading of the site, most recent event time first
    #[instrument(skip(self))]
    pub async fn list_readings(&self, site_id: &str) -> DomainResult<SiteReadings> {
        let readings: Vec<ReadingView> = self
            .site_index
            .list_descending(site_id)
            .await?
            .into_iter()
            .map(ReadingView::from)
            .collect();

        if readings.is_empty() {
            return Err(DomainError::NotFound(site_id.to_string()));
        }

        debug!(count = readings.len(), "listed site readings");
        Ok(SiteReadings {
            site_id: site_id.to_string(),
            count: readings.len(),
            readings,
        })
    }

    pub async fn check_ready(&self) -> DomainResult<()> {
        self.site_index.ping().await
    }
}
