use crate::domain::result::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub const FIELD_SITE_ID: &str = "site_id";
pub const FIELD_DEVICE_ID: &str = "device_id";
pub const FIELD_POWER_READING: &str = "power_reading";
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// A validated sensor reading as accepted by the ingestion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reading {
    pub site_id: String,
    pub device_id: String,
    pub power_reading: f64,
    pub timestamp: String,
}

impl Reading {
    /// Flat field/value pairs as stored in a stream entry.
    ///
    /// `power_reading` is written in its shortest round-trippable decimal form.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_SITE_ID, self.site_id.clone()),
            (FIELD_DEVICE_ID, self.device_id.clone()),
            (FIELD_POWER_READING, self.power_reading.to_string()),
            (FIELD_TIMESTAMP, self.timestamp.clone()),
        ]
    }
}

/// Identifier assigned by the event log on append (`<millis>-<sequence>`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Millisecond and sequence parts, if the id is in stream id form.
    pub fn parts(&self) -> Option<(u64, u64)> {
        let (ms, seq) = self.0.split_once('-')?;
        Some((ms.parse().ok()?, seq.parse().ok()?))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialOrd for EntryId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EntryId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self.parts(), other.parts()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.0.cmp(&other.0),
        }
    }
}

/// An entry claimed from the event log, fields still in their raw string form
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: EntryId,
    pub fields: HashMap<String, String>,
}

impl LogEntry {
    pub fn new(id: EntryId, fields: HashMap<String, String>) -> Self {
        Self { id, fields }
    }

    pub fn from_reading(id: EntryId, reading: &Reading) -> Self {
        let fields = reading
            .to_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self { id, fields }
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Decode the field set back into a reading.
    ///
    /// A missing `site_id` yields `InvalidEntry` since there is no index the entry could
    /// ever be written to. Every other malformed field yields `Processing`.
    pub fn decode(&self) -> Result<Reading, DomainError> {
        let site_id = self.field(FIELD_SITE_ID).ok_or_else(|| DomainError::InvalidEntry {
            entry_id: self.id.to_string(),
            reason: "missing site_id".to_string(),
        })?;

        let device_id = self
            .field(FIELD_DEVICE_ID)
            .ok_or_else(|| DomainError::processing(self.id.as_str(), "missing device_id"))?;

        let timestamp = self
            .field(FIELD_TIMESTAMP)
            .ok_or_else(|| DomainError::processing(self.id.as_str(), "missing timestamp"))?;

        let raw_power = self
            .field(FIELD_POWER_READING)
            .ok_or_else(|| DomainError::processing(self.id.as_str(), "missing power_reading"))?;

        let power_reading = raw_power
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                DomainError::processing(
                    self.id.as_str(),
                    format!("power_reading is not a finite number: {raw_power}"),
                )
            })?;

        Ok(Reading {
            site_id: site_id.to_string(),
            device_id: device_id.to_string(),
            power_reading,
            timestamp: timestamp.to_string(),
        })
    }
}

/// A reading as stored in its site's index
///
/// `power_reading` is held as a float, so an integer submission such as `42` is returned
/// as `42.0`. The numeric value is preserved, the JSON spelling is not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedReading {
    pub device_id: String,
    pub power_reading: f64,
    pub timestamp: String,
    pub source_entry_id: EntryId,
}

impl IndexedReading {
    pub fn from_reading(reading: &Reading, source_entry_id: EntryId) -> Self {
        Self {
            device_id: reading.device_id.clone(),
            power_reading: reading.power_reading,
            timestamp: reading.timestamp.clone(),
            source_entry_id,
        }
    }
}

/// Outcome of bootstrapping a consumer group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Created,
    AlreadyExists,
}

/// Per-consumer share of a group's pending set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerPending {
    pub name: String,
    pub pending: u64,
}

/// Delivered-but-unacknowledged entries of a consumer group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingSummary {
    pub count: u64,
    pub lowest_id: Option<EntryId>,
    pub highest_id: Option<EntryId>,
    pub consumers: Vec<ConsumerPending>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reading() -> Reading {
        Reading {
            site_id: "site-001".to_string(),
            device_id: "meter-42".to_string(),
            power_reading: 1500.5,
            timestamp: "2024-01-15T10:30:00Z".to_string(),
        }
    }

    #[test]
    fn test_entry_decodes_back_into_reading() {
        let entry = LogEntry::from_reading(EntryId::new("1705314600000-0"), &sample_reading());

        assert_eq!(entry.fields["power_reading"], "1500.5");
        assert_eq!(entry.decode().unwrap(), sample_reading());
    }

    #[test]
    fn test_missing_site_id_is_invalid_entry() {
        let mut entry = LogEntry::from_reading(EntryId::new("1-0"), &sample_reading());
        entry.fields.remove("site_id");

        assert!(matches!(
            entry.decode(),
            Err(DomainError::InvalidEntry { entry_id, .. }) if entry_id == "1-0"
        ));
    }

    #[test]
    fn test_empty_site_id_is_invalid_entry() {
        let mut entry = LogEntry::from_reading(EntryId::new("1-0"), &sample_reading());
        entry.fields.insert("site_id".to_string(), String::new());

        assert!(matches!(entry.decode(), Err(DomainError::InvalidEntry { .. })));
    }

    #[test]
    fn test_non_numeric_power_reading_is_processing_error() {
        let mut entry = LogEntry::from_reading(EntryId::new("1-0"), &sample_reading());
        entry
            .fields
            .insert("power_reading".to_string(), "abc".to_string());

        let err = entry.decode().unwrap_err();
        assert!(matches!(err, DomainError::Processing { .. }));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_missing_device_id_is_processing_error() {
        let mut entry = LogEntry::from_reading(EntryId::new("1-0"), &sample_reading());
        entry.fields.remove("device_id");

        assert!(matches!(entry.decode(), Err(DomainError::Processing { .. })));
    }

    #[test]
    fn test_entry_ids_order_numerically() {
        let earlier = EntryId::new("999-5");
        let later = EntryId::new("1000-0");
        let same_ms_later = EntryId::new("1000-10");

        assert!(earlier < later);
        assert!(later < same_ms_later);
        assert_eq!(same_ms_later.parts(), Some((1000, 10)));
    }

    #[test]
    fn test_reading_rejects_unknown_fields() {
        let json = serde_json::json!({
            "site_id": "s",
            "device_id": "d",
            "power_reading": 1.0,
            "timestamp": "t",
            "extra": true
        });

        assert!(serde_json::from_value::<Reading>(json).is_err());
    }
}
