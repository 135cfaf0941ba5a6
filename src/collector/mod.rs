//! Name collection: fill in first names for records that lack one.

pub mod profile;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{CollectError, Error};
use crate::normalize::normalize;
use crate::store::{RecordField, RecordStore};

pub use profile::ProfilePageSource;

/// Looks up the raw display name behind a handle.
#[async_trait]
pub trait NameSource: Send + Sync {
    async fn fetch_display_name(&self, handle: &str) -> Result<String, CollectError>;
}

/// Outcome of a collection pass.
#[derive(Debug, Clone, Default)]
pub struct CollectSummary {
    /// `(handle, clean name)` written this run.
    pub enriched: Vec<(String, String)>,
    /// Handles that already had a name.
    pub skipped: Vec<String>,
    /// `(handle, reason)` for lookups that failed; names left empty.
    pub failed: Vec<(String, String)>,
}

/// Enriches a record store from a [`NameSource`].
pub struct Collector {
    store: RecordStore,
    delay: Duration,
}

impl Collector {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            delay: Duration::from_secs(2),
        }
    }

    /// Pause between consecutive lookups.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Look up every record without a name, one at a time, saving each
    /// result as soon as it is known.
    pub async fn run(&self, source: &dyn NameSource) -> Result<CollectSummary, Error> {
        let records = self.store.load_all()?;
        let total = records.len();
        info!("Found {total} record(s) in {}", self.store.path().display());

        let mut summary = CollectSummary::default();
        let mut fetched = false;

        for (i, record) in records.iter().enumerate() {
            let position = format!("[{}/{}]", i + 1, total);
            let handle = record.display_handle();
            if handle.is_empty() {
                continue;
            }
            if record.has_name() {
                info!("{position} @{handle} - already has name: {}, skipping", record.name);
                summary.skipped.push(handle.to_string());
                continue;
            }

            if fetched && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            fetched = true;

            info!("{position} Fetching name for @{handle}...");
            match source.fetch_display_name(handle).await {
                Ok(raw) => {
                    let clean = normalize(&raw, handle);
                    info!("  Found: {raw} -> {clean}");
                    self.store.mark_field(&record.handle, RecordField::Name, &clean)?;
                    summary.enriched.push((handle.to_string(), clean));
                }
                Err(e) => {
                    warn!("  Could not fetch name for @{handle}: {e}. Handle will be used when sending.");
                    summary.failed.push((handle.to_string(), e.to_string()));
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::store::Record;

    struct MapSource(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl NameSource for MapSource {
        async fn fetch_display_name(&self, handle: &str) -> Result<String, CollectError> {
            self.0
                .get(handle)
                .map(|s| s.to_string())
                .ok_or_else(|| CollectError::NotFound {
                    handle: handle.to_string(),
                })
        }
    }

    fn store_with(records: &[Record]) -> (tempfile::TempDir, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("influencers.csv"));
        store.save_all(records).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn fills_missing_names_only() {
        let (_dir, store) = store_with(&[
            Record::new("@jane", "j@example.com"),
            Record::new("bob", "b@example.com").with_name("Robert"),
            Record::new("ghost", "g@example.com"),
            Record::new("kai", ""),
        ]);
        let source = MapSource(HashMap::from([
            ("jane", "✨ Jane Doe | Coach"),
            ("bob", "Bobby"),
            ("kai", "🌊🌊"),
        ]));

        let summary = Collector::new(store.clone())
            .with_delay(Duration::ZERO)
            .run(&source)
            .await
            .unwrap();

        let records = store.load_all().unwrap();
        assert_eq!(records[0].name, "Jane");
        assert_eq!(records[1].name, "Robert");
        assert_eq!(records[2].name, "");
        assert_eq!(records[3].name, "kai");

        assert_eq!(summary.skipped, vec!["bob"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "ghost");
        assert_eq!(
            summary.enriched,
            vec![("jane".to_string(), "Jane".to_string()), ("kai".to_string(), "kai".to_string())]
        );
    }

    #[tokio::test]
    async fn second_pass_fetches_nothing_new() {
        let (_dir, store) = store_with(&[Record::new("jane", "j@example.com")]);
        let source = MapSource(HashMap::from([("jane", "Jane")]));
        let collector = Collector::new(store.clone()).with_delay(Duration::ZERO);

        collector.run(&source).await.unwrap();
        let after_first = std::fs::read(store.path()).unwrap();
        let summary = collector.run(&source).await.unwrap();

        assert!(summary.enriched.is_empty());
        assert_eq!(summary.skipped, vec!["jane"]);
        assert_eq!(after_first, std::fs::read(store.path()).unwrap());
    }

    #[tokio::test]
    async fn missing_store_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let collector = Collector::new(RecordStore::new(dir.path().join("none.csv")));
        let source = MapSource(HashMap::new());
        assert!(matches!(collector.run(&source).await, Err(Error::Store(_))));
    }
}
