//! City → area directory from the listing backend.
//!
//! The directory changes rarely, so it is cached for a day. When the
//! backend cannot be reached an expired copy is better than nothing and is
//! served instead.

use crate::location::cache::TtlCache;
use crate::location::transport::HttpTransport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_AREA_URL: &str = "https://prop.digiheadway.in/api/network-area.php";

const CACHE_KEY: &str = "propnet_area_city_cache";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityAreas {
    pub city: String,
    #[serde(default)]
    pub areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AreaCityData {
    pub cities: Vec<CityAreas>,
}

#[derive(Debug, thiserror::Error)]
pub enum AreaError {
    #[error("area backend returned HTTP {0}")]
    Status(u16),
    #[error("area backend unreachable: {0}")]
    Transport(String),
    #[error("invalid area payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct AreaDirectory {
    transport: Arc<dyn HttpTransport>,
    cache: TtlCache,
    url: String,
    ttl: Duration,
    timeout: Duration,
}

impl AreaDirectory {
    pub fn new(transport: Arc<dyn HttpTransport>, cache: TtlCache, url: impl Into<String>) -> Self {
        Self {
            transport,
            cache,
            url: url.into(),
            ttl: Duration::from_secs(24 * 3600),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    async fn fetch(&self) -> Result<AreaCityData, AreaError> {
        let response = self
            .transport
            .get(&self.url, self.timeout)
            .await
            .map_err(|e| AreaError::Transport(e.to_string()))?;
        if !response.is_success() {
            return Err(AreaError::Status(response.status));
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Cached data if fresh, else a fetch; on fetch failure the stale copy.
    /// `None` only when nothing was ever cached and the backend is down.
    pub async fn data(&self, force_refresh: bool) -> Option<AreaCityData> {
        let cached = self.cache.get_any::<AreaCityData>(CACHE_KEY, self.ttl);
        if let Some(hit) = &cached {
            if hit.fresh && !force_refresh {
                return Some(hit.value.clone());
            }
        }

        match self.fetch().await {
            Ok(data) => {
                self.cache.put(CACHE_KEY, &data);
                Some(data)
            }
            Err(e) => {
                tracing::warn!(error = %e, "area directory fetch failed, trying expired cache");
                cached.map(|hit| hit.value)
            }
        }
    }

    /// Warm the cache without blocking the caller.
    pub fn refresh_in_background(&self) -> Option<tokio::task::JoinHandle<()>> {
        // get_any keeps an expired copy around as the fallback
        let fresh = self
            .cache
            .get_any::<AreaCityData>(CACHE_KEY, self.ttl)
            .is_some_and(|hit| hit.fresh);
        if fresh {
            return None;
        }
        let this = self.clone();
        Some(tokio::spawn(async move {
            match this.fetch().await {
                Ok(data) => {
                    this.cache.put(CACHE_KEY, &data);
                    tracing::info!(cities = data.cities.len(), "area directory cached in background");
                }
                Err(e) => tracing::warn!(error = %e, "background area fetch failed"),
            }
        }))
    }

    pub fn clear(&self) {
        self.cache.remove(CACHE_KEY);
    }

    pub async fn cities(&self) -> Vec<String> {
        self.data(false)
            .await
            .map(|d| d.cities.into_iter().map(|c| c.city).collect())
            .unwrap_or_default()
    }

    pub async fn areas_for_city(&self, city: &str) -> Vec<String> {
        self.data(false)
            .await
            .and_then(|d| d.cities.into_iter().find(|c| c.city == city))
            .map(|c| c.areas)
            .unwrap_or_default()
    }

    /// Every area across all cities, deduplicated and sorted.
    pub async fn all_areas(&self) -> Vec<String> {
        let Some(data) = self.data(false).await else {
            return Vec::new();
        };
        data.cities
            .into_iter()
            .flat_map(|c| c.areas)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::cache::MemoryStore;
    use crate::location::transport::fake::{self, FakeTransport};
    use std::sync::atomic::{AtomicBool, Ordering};

    const BODY: &str = r#"{"cities":[
        {"city":"Panipat","areas":["Model Town","Sector 12"]},
        {"city":"Karnal","areas":["Sector 12","Urban Estate"]}
    ]}"#;

    fn directory(transport: Arc<FakeTransport>) -> AreaDirectory {
        AreaDirectory::new(transport, TtlCache::new(Arc::new(MemoryStore::new())), "https://backend.test/areas")
    }

    #[tokio::test]
    async fn test_fetch_then_cache() {
        let transport = Arc::new(FakeTransport::new(|url| (Duration::ZERO, fake::ok(url, BODY))));
        let dir = directory(transport.clone());

        assert_eq!(dir.cities().await, vec!["Panipat", "Karnal"]);
        assert_eq!(dir.areas_for_city("Karnal").await, vec!["Sector 12", "Urban Estate"]);
        assert!(dir.areas_for_city("Rohtak").await.is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_areas_sorted_unique() {
        let transport = Arc::new(FakeTransport::new(|url| (Duration::ZERO, fake::ok(url, BODY))));
        let dir = directory(transport);
        assert_eq!(dir.all_areas().await, vec!["Model Town", "Sector 12", "Urban Estate"]);
    }

    #[tokio::test]
    async fn test_stale_copy_when_backend_down() {
        let up = Arc::new(AtomicBool::new(true));
        let flag = up.clone();
        let transport = Arc::new(FakeTransport::new(move |url| {
            if flag.load(Ordering::SeqCst) {
                (Duration::ZERO, fake::ok(url, BODY))
            } else {
                (Duration::ZERO, fake::status(url, 500))
            }
        }));
        let dir = directory(transport.clone());

        assert!(dir.data(false).await.is_some());
        up.store(false, Ordering::SeqCst);
        let stale = dir.data(true).await.unwrap();
        assert_eq!(stale.cities.len(), 2);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_expired_copy_served_when_backend_down() {
        let store = Arc::new(MemoryStore::new());
        let dir = AreaDirectory::new(
            Arc::new(FakeTransport::unreachable()),
            TtlCache::new(store),
            "https://backend.test/areas",
        )
        .with_ttl(Duration::ZERO);
        dir.cache.put(CACHE_KEY, &serde_json::from_str::<AreaCityData>(BODY).unwrap());

        assert_eq!(dir.cities().await, vec!["Panipat", "Karnal"]);
    }

    #[tokio::test]
    async fn test_failed_background_refresh_keeps_expired_copy() {
        let dir = AreaDirectory::new(
            Arc::new(FakeTransport::unreachable()),
            TtlCache::in_memory(),
            "https://backend.test/areas",
        )
        .with_ttl(Duration::ZERO);
        dir.cache.put(CACHE_KEY, &serde_json::from_str::<AreaCityData>(BODY).unwrap());

        dir.refresh_in_background().unwrap().await.unwrap();
        assert_eq!(dir.cities().await, vec!["Panipat", "Karnal"]);
    }

    #[tokio::test]
    async fn test_nothing_cached_and_backend_down() {
        let dir = directory(Arc::new(FakeTransport::unreachable()));
        assert!(dir.data(false).await.is_none());
        assert!(dir.cities().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let transport = Arc::new(FakeTransport::new(|url| (Duration::ZERO, fake::ok(url, BODY))));
        let dir = directory(transport.clone());
        dir.cities().await;
        dir.clear();
        dir.cities().await;
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_background_refresh_skipped_when_fresh() {
        let transport = Arc::new(FakeTransport::new(|url| (Duration::ZERO, fake::ok(url, BODY))));
        let dir = directory(transport.clone());

        dir.refresh_in_background().unwrap().await.unwrap();
        assert_eq!(transport.call_count(), 1);
        assert!(dir.refresh_in_background().is_none());
        assert_eq!(dir.cities().await.len(), 2);
        assert_eq!(transport.call_count(), 1);
    }
}
