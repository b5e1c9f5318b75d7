use crate::domain::reading::IndexedReading;
use crate::domain::result::DomainResult;
use async_trait::async_trait;

/// Key under which a site's readings are indexed
pub fn site_key(site_id: &str) -> String {
    format!("site:{}", site_id)
}

/// Per-site chronological index of readings
/// Infrastructure layer (Redis sorted sets) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SiteIndex: Send + Sync {
    /// Insert a reading under its site with the given score (epoch millis).
    /// Equal scores are allowed; inserting the same reading twice must not fail.
    async fn insert(&self, site_id: &str, score: f64, reading: &IndexedReading) -> DomainResult<()>;

    /// All readings of a site, highest score first. Unknown sites yield an empty list.
    async fn list_descending(&self, site_id: &str) -> DomainResult<Vec<IndexedReading>>;

    /// Round-trip health check
    async fn ping(&self) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_key_format() {
        assert_eq!(site_key("site-001"), "site:site-001");
    }
}
