use common::domain::{DomainResult, EventLog, GroupStatus};
use std::sync::Arc;
use tracing::{info, instrument};

/// Bootstraps the consumer group the stream processor reads through
pub struct ConsumerGroupCoordinator {
    event_log: Arc<dyn EventLog>,
}

impl ConsumerGroupCoordinator {
    pub fn new(event_log: Arc<dyn EventLog>) -> Self {
        Self { event_log }
    }

    /// Create the group at the end of the stream unless it exists. Safe on every start.
    #[instrument(skip(self))]
    pub async fn ensure_group(&self, stream: &str, group: &str) -> DomainResult<GroupStatus> {
        let status = self.event_log.create_group(stream, group).await?;

        match status {
            GroupStatus::Created => info!("consumer group created"),
            GroupStatus::AlreadyExists => info!("consumer group already exists"),
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{DomainError, MockEventLog};

    #[tokio::test]
    async fn test_existing_group_is_success() {
        let mut log = MockEventLog::new();
        log.expect_create_group()
            .withf(|stream: &str, group: &str| stream == "energy_readings" && group == "processing_group")
            .times(1)
            .return_once(|_, _| Ok(GroupStatus::AlreadyExists));

        let coordinator = ConsumerGroupCoordinator::new(Arc::new(log));
        let status = coordinator
            .ensure_group("energy_readings", "processing_group")
            .await
            .unwrap();

        assert_eq!(status, GroupStatus::AlreadyExists);
    }

    #[tokio::test]
    async fn test_other_failures_propagate() {
        let mut log = MockEventLog::new();
        log.expect_create_group()
            .times(1)
            .return_once(|_, _| Err(DomainError::Dependency(anyhow::anyhow!("WRONGTYPE"))));

        let coordinator = ConsumerGroupCoordinator::new(Arc::new(log));
        let result = coordinator.ensure_group("energy_readings", "processing_group").await;

        assert!(result.unwrap_err().is_dependency());
    }
}
