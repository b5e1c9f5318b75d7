use common::domain::{DomainResult, EntryId, EventLog};
use common::jsonschema::ReadingValidator;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Domain service that validates submitted readings and appends them to the event log
///
/// Flow:
/// 1. Validate the body against the reading schema, collecting every violation
/// 2. Append the reading to the stream
/// 3. Return the id the log assigned
///
/// A body that fails validation never reaches the log.
pub struct ReadingService {
    event_log: Arc<dyn EventLog>,
    validator: ReadingValidator,
    stream: String,
}

impl ReadingService {
    pub fn new(event_log: Arc<dyn EventLog>, validator: ReadingValidator, stream: impl Into<String>) -> Self {
        Self {
            event_log,
            validator,
            stream: stream.into(),
        }
    }

    #[instrument(skip(self, body), fields(stream = %self.stream))]
    pub async fn submit(&self, body: &Value) -> DomainResult<EntryId> {
        let reading = self.validator.validate(body)?;

        debug!(
            site_id = %reading.site_id,
            device_id = %reading.device_id,
            "appending validated reading"
        );

        let id = self.event_log.append(&self.stream, &reading).await?;

        info!(stream_id = %id, site_id = %reading.site_id, "reading accepted");
        Ok(id)
    }

    /// Round-trip to the event log
    pub async fn check_ready(&self) -> DomainResult<()> {
        self.event_log.ping().await
    }
}
