/// Instrument cache shared read-only across scans
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::broker::MarketDataProvider;
use crate::error::Result;
use crate::types::Instrument;

#[derive(Debug, Clone)]
struct CacheEntry {
    instruments: Arc<Vec<Instrument>>,
    loaded_at: DateTime<Utc>,
}

/// Instrument master per exchange segment, loaded lazily
#[derive(Debug, Default)]
pub struct InstrumentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InstrumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached snapshot, loading it on first use
    pub async fn get_or_load(
        &self,
        provider: &dyn MarketDataProvider,
        segment: &str,
    ) -> Result<Arc<Vec<Instrument>>> {
        if let Some(instruments) = self.snapshot(segment).await {
            return Ok(instruments);
        }

        let loaded = self.load(provider, segment).await?;

        // A concurrent scan may have won the race; keep whichever landed first
        let mut entries = self.entries.write().await;
        let entry = entries.entry(segment.to_string()).or_insert(loaded);
        Ok(Arc::clone(&entry.instruments))
    }

    /// Download the instrument master and replace the cached snapshot
    pub async fn refresh(&self, provider: &dyn MarketDataProvider, segment: &str) -> Result<usize> {
        let loaded = self.load(provider, segment).await?;
        let count = loaded.instruments.len();

        let mut entries = self.entries.write().await;
        entries.insert(segment.to_string(), loaded);

        Ok(count)
    }

    async fn load(&self, provider: &dyn MarketDataProvider, segment: &str) -> Result<CacheEntry> {
        info!("📥 Downloading instrument master for {}...", segment);
        let instruments = provider.list_instruments(segment).await?;
        info!("✅ Cached {} instruments for {}", instruments.len(), segment);

        Ok(CacheEntry {
            instruments: Arc::new(instruments),
            loaded_at: Utc::now(),
        })
    }

    /// Drop one segment, or everything when `segment` is None
    pub async fn invalidate(&self, segment: Option<&str>) {
        let mut entries = self.entries.write().await;
        match segment {
            Some(segment) => {
                entries.remove(segment);
            }
            None => entries.clear(),
        }
    }

    pub async fn snapshot(&self, segment: &str) -> Option<Arc<Vec<Instrument>>> {
        let entries = self.entries.read().await;
        entries.get(segment).map(|e| Arc::clone(&e.instruments))
    }

    /// Check if cache needs refresh (daily)
    pub async fn needs_refresh(&self, segment: &str, now: DateTime<Utc>) -> bool {
        let entries = self.entries.read().await;
        match entries.get(segment) {
            None => true,
            Some(entry) => (now - entry.loaded_at).num_hours() >= 24,
        }
    }

    /// Get cache size
    pub async fn size(&self, segment: &str) -> usize {
        let entries = self.entries.read().await;
        entries.get(segment).map_or(0, |e| e.instruments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::testing::{option, MockProvider};
    use crate::types::OptionType;

    #[tokio::test]
    async fn test_lazy_load_once() {
        let provider = MockProvider::new(vec![option("NIFTY", OptionType::CE, 25_000.0, 7)]);
        let cache = InstrumentCache::new();
        assert!(cache.needs_refresh("NFO", Utc::now()).await);

        let first = cache.get_or_load(&provider, "NFO").await.unwrap();
        let second = cache.get_or_load(&provider, "NFO").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.instrument_calls(), 1);
        assert_eq!(cache.size("NFO").await, 1);
        assert!(!cache.needs_refresh("NFO", Utc::now()).await);
        assert!(cache.needs_refresh("NFO", Utc::now() + chrono::Duration::hours(25)).await);
    }

    #[tokio::test]
    async fn test_refresh_and_invalidate() {
        let provider = MockProvider::new(vec![option("NIFTY", OptionType::PE, 25_000.0, 7)]);
        let cache = InstrumentCache::new();

        assert_eq!(cache.refresh(&provider, "NFO").await.unwrap(), 1);
        cache.invalidate(Some("NFO")).await;
        assert!(cache.snapshot("NFO").await.is_none());

        cache.get_or_load(&provider, "NFO").await.unwrap();
        assert_eq!(provider.instrument_calls(), 2);
        cache.invalidate(None).await;
        assert_eq!(cache.size("NFO").await, 0);
    }

    #[tokio::test]
    async fn test_load_failure_is_not_cached() {
        let provider = MockProvider::new(Vec::new()).failing_instruments();
        let cache = InstrumentCache::new();
        assert!(cache.get_or_load(&provider, "NFO").await.is_err());
        assert!(cache.snapshot("NFO").await.is_none());
    }
}
