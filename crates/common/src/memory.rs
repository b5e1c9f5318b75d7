use crate::domain::{
    ClaimInput, ConsumerPending, DomainError, DomainResult, EntryId, EventLog, GroupStatus, IndexedReading,
    LogEntry, PendingSummary, Reading, SiteIndex,
};
use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Default)]
struct GroupState {
    /// Index of the first entry never delivered to this group
    cursor: usize,
    /// Delivered but unacknowledged entries and the consumer holding each
    pending: BTreeMap<EntryId, String>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<LogEntry>,
    groups: HashMap<String, GroupState>,
}

#[derive(Default)]
struct LogState {
    streams: HashMap<String, StreamState>,
    last_id: (u64, u64),
    unavailable: bool,
}

impl LogState {
    fn next_id(&mut self) -> EntryId {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let (last_ms, last_seq) = self.last_id;
        self.last_id = if now > last_ms {
            (now, 0)
        } else {
            (last_ms, last_seq + 1)
        };
        EntryId::new(format!("{}-{}", self.last_id.0, self.last_id.1))
    }

    fn check_available(&self) -> DomainResult<()> {
        if self.unavailable {
            return Err(anyhow!("event log unavailable").into());
        }
        Ok(())
    }
}

/// In-process event log with consumer-group semantics for tests
pub struct MemoryEventLog {
    state: Mutex<LogState>,
    appended: watch::Sender<u64>,
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventLog {
    pub fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            state: Mutex::new(LogState::default()),
            appended,
        }
    }

    /// Make every subsequent call fail as if the server were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Append an arbitrary field set, bypassing reading validation
    pub fn append_raw(&self, stream: &str, fields: HashMap<String, String>) -> EntryId {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id();
            state
                .streams
                .entry(stream.to_string())
                .or_default()
                .entries
                .push(LogEntry::new(id.clone(), fields));
            id
        };
        self.appended.send_modify(|n| *n += 1);
        id
    }

    pub fn entries(&self, stream: &str) -> Vec<LogEntry> {
        self.state
            .lock()
            .streams
            .get(stream)
            .map(|s| s.entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self, stream: &str) -> usize {
        self.state
            .lock()
            .streams
            .get(stream)
            .map_or(0, |s| s.entries.len())
    }

    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }

    pub fn pending_ids(&self, stream: &str, group: &str) -> Vec<EntryId> {
        self.state
            .lock()
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Transfer every pending entry of the group to `consumer` and return them,
    /// the way an operator-driven reclaim would re-present stuck entries.
    pub fn reclaim_pending(&self, stream: &str, group: &str, consumer: &str) -> Vec<LogEntry> {
        let mut state = self.state.lock();
        let Some(stream_state) = state.streams.get_mut(stream) else {
            return Vec::new();
        };
        let StreamState { entries, groups } = stream_state;
        let Some(group_state) = groups.get_mut(group) else {
            return Vec::new();
        };

        group_state
            .pending
            .iter_mut()
            .filter_map(|(id, owner)| {
                *owner = consumer.to_string();
                entries.iter().find(|e| &e.id == id).cloned()
            })
            .collect()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, stream: &str, reading: &Reading) -> DomainResult<EntryId> {
        self.state.lock().check_available()?;
        let fields = reading
            .to_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Ok(self.append_raw(stream, fields))
    }

    async fn create_group(&self, stream: &str, group: &str) -> DomainResult<GroupStatus> {
        let mut state = self.state.lock();
        state.check_available()?;

        let stream_state = state.streams.entry(stream.to_string()).or_default();
        if stream_state.groups.contains_key(group) {
            return Ok(GroupStatus::AlreadyExists);
        }

        let cursor = stream_state.entries.len();
        stream_state.groups.insert(
            group.to_string(),
            GroupState {
                cursor,
                ..GroupState::default()
            },
        );
        Ok(GroupStatus::Created)
    }

    /// A zero `block` returns immediately instead of waiting forever.
    async fn claim(&self, input: ClaimInput) -> DomainResult<Vec<LogEntry>> {
        let deadline = Instant::now() + input.block;
        let mut appended = self.appended.subscribe();

        loop {
            {
                let mut state = self.state.lock();
                state.check_available()?;

                let stream_state = state
                    .streams
                    .get_mut(&input.stream)
                    .ok_or_else(|| anyhow!("no such stream: {}", input.stream))?;
                let StreamState { entries, groups } = stream_state;
                let group = groups
                    .get_mut(&input.group)
                    .ok_or_else(|| anyhow!("no such consumer group: {}", input.group))?;

                let end = entries.len().min(group.cursor + input.count);
                if end > group.cursor {
                    let batch = entries[group.cursor..end].to_vec();
                    for entry in &batch {
                        group
                            .pending
                            .insert(entry.id.clone(), input.consumer.clone());
                    }
                    group.cursor = end;
                    return Ok(batch);
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            match tokio::time::timeout(remaining, appended.changed()).await {
                Ok(Ok(())) => continue,
                _ => return Ok(Vec::new()),
            }
        }
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: &EntryId) -> DomainResult<()> {
        let mut state = self.state.lock();
        state.check_available()?;

        if let Some(group_state) = state
            .streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
        {
            group_state.pending.remove(id);
        }
        Ok(())
    }

    async fn pending_summary(&self, stream: &str, group: &str) -> DomainResult<PendingSummary> {
        let state = self.state.lock();
        state.check_available()?;

        let group_state = state
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .ok_or_else(|| anyhow!("no such consumer group: {}", group))?;

        let mut per_consumer: BTreeMap<&str, u64> = BTreeMap::new();
        for owner in group_state.pending.values() {
            *per_consumer.entry(owner.as_str()).or_default() += 1;
        }

        Ok(PendingSummary {
            count: group_state.pending.len() as u64,
            lowest_id: group_state.pending.keys().next().cloned(),
            highest_id: group_state.pending.keys().next_back().cloned(),
            consumers: per_consumer
                .into_iter()
                .map(|(name, pending)| ConsumerPending {
                    name: name.to_string(),
                    pending,
                })
                .collect(),
        })
    }

    async fn ping(&self) -> DomainResult<()> {
        self.state.lock().check_available()
    }
}

#[derive(Default)]
struct IndexState {
    /// Sorted-set members per site key, keyed by their encoded form
    sites: HashMap<String, HashMap<String, f64>>,
    failing: bool,
}

/// In-process per-site index with sorted-set semantics for tests
#[derive(Default)]
pub struct MemorySiteIndex {
    state: Mutex<IndexState>,
}

impl MemorySiteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the server were unreachable
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    pub fn site_len(&self, site_id: &str) -> usize {
        self.state.lock().sites.get(site_id).map_or(0, HashMap::len)
    }

    fn check_available(state: &IndexState) -> DomainResult<()> {
        if state.failing {
            return Err(anyhow!("site index unavailable").into());
        }
        Ok(())
    }
}

#[async_trait]
impl SiteIndex for MemorySiteIndex {
    async fn insert(&self, site_id: &str, score: f64, reading: &IndexedReading) -> DomainResult<()> {
        let member = serde_json::to_string(reading).map_err(anyhow::Error::from)?;

        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state
            .sites
            .entry(site_id.to_string())
            .or_default()
            .insert(member, score);
        Ok(())
    }

    async fn list_descending(&self, site_id: &str) -> DomainResult<Vec<IndexedReading>> {
        let state = self.state.lock();
        Self::check_available(&state)?;

        let Some(members) = state.sites.get(site_id) else {
            return Ok(Vec::new());
        };

        // Highest score first, equal scores in reverse lexicographic member order
        let mut ordered: Vec<(&String, f64)> = members.iter().map(|(m, s)| (m, *s)).collect();
        ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));

        ordered
            .into_iter()
            .map(|(member, _)| {
                serde_json::from_str::<IndexedReading>(member)
                    .map_err(|e| DomainError::from(anyhow::Error::from(e)))
            })
            .collect()
    }

    async fn ping(&self) -> DomainResult<()> {
        Self::check_available(&self.state.lock())
    }
}
