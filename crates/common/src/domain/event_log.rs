use crate::domain::reading::{EntryId, GroupStatus, LogEntry, PendingSummary, Reading};
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use std::time::Duration;

/// Input for claiming never-delivered entries on behalf of one consumer
#[derive(Debug, Clone)]
pub struct ClaimInput {
    pub stream: String,
    pub group: String,
    pub consumer: String,
    pub count: usize,
    pub block: Duration,
}

/// Append-only event log with consumer-group delivery
///
/// Implementations should:
/// - Assign strictly increasing entry ids on append
/// - Hand every entry to at most one consumer of a group at a time
/// - Keep delivered entries pending until they are acknowledged
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append a reading to the stream, returning its assigned id
    async fn append(&self, stream: &str, reading: &Reading) -> DomainResult<EntryId>;

    /// Create a consumer group positioned at the end of the stream, creating the stream
    /// if needed. An existing group is reported as `AlreadyExists`, never as an error.
    async fn create_group(&self, stream: &str, group: &str) -> DomainResult<GroupStatus>;

    /// Claim up to `count` new entries, blocking at most `block` when none are available.
    /// A block timeout yields an empty batch.
    async fn claim(&self, input: ClaimInput) -> DomainResult<Vec<LogEntry>>;

    /// Remove an entry from the group's pending set
    async fn acknowledge(&self, stream: &str, group: &str, id: &EntryId) -> DomainResult<()>;

    /// Summarise the group's pending set
    async fn pending_summary(&self, stream: &str, group: &str) -> DomainResult<PendingSummary>;

    /// Round-trip health check
    async fn ping(&self) -> DomainResult<()>;
}
