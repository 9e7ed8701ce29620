//! Memoized, concurrency-bounded place resolution
//!
//! The map vendor rate-limits aggressively, so lookups pass through an
//! admission-control queue: a FIFO-fair semaphore caps in-flight requests
//! and each finished lookup holds its slot for a cooldown before the next
//! queued caller is dispatched. Every outcome, including a miss, is cached
//! for the process lifetime keyed by the normalized address.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use super::{in_home_box, is_international_destination, GeoPoint, GeocodeProvider};

/// Resolver tuning, constructor-injected rather than global
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum provider lookups in flight at once
    pub max_concurrent: usize,
    /// Delay before a finished lookup's slot is handed to the next caller
    pub cooldown: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            cooldown: Duration::from_millis(500),
        }
    }
}

/// Tiered, cached place resolver over a [`GeocodeProvider`]
///
/// A lookup that errors resolves to not-found for that call; it is not
/// retried and the error is not distinguished from a genuine miss in the
/// return value (callers see `None` either way, the distinction is logged).
pub struct PlaceResolver<P> {
    provider: P,
    cache: Mutex<HashMap<String, Option<GeoPoint>>>,
    slots: Arc<Semaphore>,
    cooldown: Duration,
}

impl<P: GeocodeProvider> PlaceResolver<P> {
    pub fn new(provider: P, config: ResolverConfig) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            cooldown: config.cooldown,
        }
    }

    /// Resolve an address to coordinates, or `None` when nothing is found
    ///
    /// Identical normalized input always yields the cached result on
    /// subsequent calls; negative results are cached too.
    pub async fn resolve(&self, address: &str) -> Option<GeoPoint> {
        let key = address.trim().to_lowercase();
        if key.is_empty() {
            warn!("resolve called with a blank address");
            return None;
        }

        if let Some(hit) = self.cache.lock().await.get(&key) {
            debug!(address, "geocode cache hit");
            return *hit;
        }

        let Ok(permit) = self.slots.clone().acquire_owned().await else {
            // Semaphore is never closed while the resolver lives
            return None;
        };

        // The answer may have landed in the cache while we queued
        if let Some(hit) = self.cache.lock().await.get(&key) {
            self.release_after_cooldown(permit);
            return *hit;
        }

        let result = self.lookup(address).await;
        self.cache.lock().await.insert(key, result);
        self.release_after_cooldown(permit);
        result
    }

    /// Reverse geocode pass-through; errors resolve to `None`
    pub async fn reverse_geocode(&self, point: GeoPoint) -> Option<String> {
        match self.provider.reverse_geocode(point).await {
            Ok(address) => address,
            Err(e) => {
                warn!(error = %e, "reverse geocode failed");
                None
            }
        }
    }

    /// Hold the concurrency slot for the cooldown without delaying the
    /// caller's result
    fn release_after_cooldown(&self, permit: tokio::sync::OwnedSemaphorePermit) {
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            drop(permit);
        });
    }

    /// Dispatch exactly one lookup strategy for the call
    async fn lookup(&self, address: &str) -> Option<GeoPoint> {
        if is_international_destination(address) {
            debug!(address, "dispatching international search tier");
            self.search_tier(address).await
        } else {
            debug!(address, "dispatching domestic geocode tier");
            self.geocode_tier(address).await
        }
    }

    /// Direct geocode tier (domestic dispatch)
    ///
    /// A returned point inside the home box for an address classified
    /// international is treated as a likely false match and escalated to
    /// the search tier; a plain miss also falls through to search.
    async fn geocode_tier(&self, address: &str) -> Option<GeoPoint> {
        match self.provider.geocode(address).await {
            Ok(Some(point)) => {
                if in_home_box(point) && is_international_destination(address) {
                    warn!(address, "in-box result for international destination, escalating");
                    self.search_tier(address).await
                } else {
                    Some(point)
                }
            }
            Ok(None) => {
                debug!(address, "geocode miss, escalating to search tier");
                self.search_tier(address).await
            }
            Err(e) => {
                warn!(address, error = %e, "geocode lookup failed");
                None
            }
        }
    }

    /// Region-aware search tier
    ///
    /// Candidates are partitioned by the home bounding box; the side
    /// matching the address classification wins, the other side is the
    /// fallback. A search error or zero candidates falls back to a plain
    /// direct geocode as a last resort.
    async fn search_tier(&self, address: &str) -> Option<GeoPoint> {
        match self.provider.search(address).await {
            Ok(candidates) if !candidates.is_empty() => {
                let (domestic, international): (Vec<_>, Vec<_>) =
                    candidates.into_iter().partition(|p| in_home_box(*p));

                let (preferred, fallback) = if is_international_destination(address) {
                    (international, domestic)
                } else {
                    (domestic, international)
                };

                if preferred.is_empty() && !fallback.is_empty() {
                    warn!(address, "no candidate on the classified side, using fallback");
                }
                preferred.first().or_else(|| fallback.first()).copied()
            }
            Ok(_) => {
                debug!(address, "search returned no candidates, trying plain geocode");
                self.fallback_geocode(address).await
            }
            Err(e) => {
                warn!(address, error = %e, "search failed, trying plain geocode");
                self.fallback_geocode(address).await
            }
        }
    }

    /// Last-resort plain geocode, no escalation checks
    async fn fallback_geocode(&self, address: &str) -> Option<GeoPoint> {
        match self.provider.geocode(address).await {
            Ok(point) => point,
            Err(e) => {
                warn!(address, error = %e, "fallback geocode failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::{Error, Result};

    use super::*;

    const BEIJING: GeoPoint = GeoPoint {
        lat: 39.9,
        lng: 116.4,
    };
    const TOKYO: GeoPoint = GeoPoint {
        lat: 35.7,
        lng: 139.7,
    };

    /// Scriptable provider with call-count instrumentation
    #[derive(Default)]
    struct MockProvider {
        geocode_result: Option<GeoPoint>,
        geocode_fails: bool,
        search_results: Vec<GeoPoint>,
        search_fails: bool,
        geocode_calls: AtomicUsize,
        search_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
    }

    impl MockProvider {
        fn track_entry(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        }

        fn track_exit(&self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl GeocodeProvider for Arc<MockProvider> {
        async fn geocode(&self, _address: &str) -> Result<Option<GeoPoint>> {
            self.geocode_calls.fetch_add(1, Ordering::SeqCst);
            self.track_entry();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.track_exit();
            if self.geocode_fails {
                return Err(Error::Provider("geocode unavailable".into()));
            }
            Ok(self.geocode_result)
        }

        async fn search(&self, _address: &str) -> Result<Vec<GeoPoint>> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            if self.search_fails {
                return Err(Error::Provider("search unavailable".into()));
            }
            Ok(self.search_results.clone())
        }

        async fn reverse_geocode(&self, _point: GeoPoint) -> Result<Option<String>> {
            Ok(None)
        }
    }

    fn fast_config() -> ResolverConfig {
        ResolverConfig {
            max_concurrent: 2,
            cooldown: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_domestic_address_uses_direct_geocode_only() {
        let provider = Arc::new(MockProvider {
            geocode_result: Some(BEIJING),
            ..Default::default()
        });
        let resolver = PlaceResolver::new(provider.clone(), fast_config());

        let point = resolver.resolve("北京").await;
        assert_eq!(point, Some(BEIJING));
        assert_eq!(provider.geocode_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_international_prefers_out_of_box_candidate() {
        let provider = Arc::new(MockProvider {
            search_results: vec![TOKYO, BEIJING],
            ..Default::default()
        });
        let resolver = PlaceResolver::new(provider, fast_config());

        let point = resolver.resolve("东京").await;
        assert_eq!(point, Some(TOKYO));
    }

    #[tokio::test]
    async fn test_international_falls_back_to_in_box_candidate() {
        let provider = Arc::new(MockProvider {
            search_results: vec![BEIJING],
            ..Default::default()
        });
        let resolver = PlaceResolver::new(provider, fast_config());

        assert_eq!(resolver.resolve("东京").await, Some(BEIJING));
    }

    #[tokio::test]
    async fn test_in_box_geocode_for_international_address_escalates() {
        let provider = Arc::new(MockProvider {
            geocode_result: Some(BEIJING),
            search_results: vec![TOKYO],
            ..Default::default()
        });
        let resolver = PlaceResolver::new(provider.clone(), fast_config());

        // Drive the direct-geocode tier with an international address: the
        // in-box point must be rejected in favor of the search result
        let point = resolver.geocode_tier("东京").await;
        assert_eq!(point, Some(TOKYO));
        assert_eq!(provider.search_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_error_falls_back_to_plain_geocode() {
        let provider = Arc::new(MockProvider {
            geocode_result: Some(TOKYO),
            search_fails: true,
            ..Default::default()
        });
        let resolver = PlaceResolver::new(provider.clone(), fast_config());

        assert_eq!(resolver.resolve("东京").await, Some(TOKYO));
        assert_eq!(provider.geocode_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_resolve_is_a_cache_hit() {
        let provider = Arc::new(MockProvider {
            geocode_result: Some(BEIJING),
            ..Default::default()
        });
        let resolver = PlaceResolver::new(provider.clone(), fast_config());

        assert_eq!(resolver.resolve("北京").await, Some(BEIJING));
        assert_eq!(resolver.resolve("  北京 ").await, Some(BEIJING));
        assert_eq!(provider.geocode_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_error_resolves_to_none_and_is_cached() {
        let provider = Arc::new(MockProvider {
            geocode_fails: true,
            ..Default::default()
        });
        let resolver = PlaceResolver::new(provider.clone(), fast_config());

        assert_eq!(resolver.resolve("某地").await, None);
        assert_eq!(resolver.resolve("某地").await, None);
        // Negative caching: the failed lookup is not repeated
        assert_eq!(provider.geocode_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_address_is_rejected() {
        let provider = Arc::new(MockProvider::default());
        let resolver = PlaceResolver::new(provider.clone(), fast_config());

        assert_eq!(resolver.resolve("   ").await, None);
        assert_eq!(provider.geocode_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded_by_cap() {
        let provider = Arc::new(MockProvider {
            geocode_result: Some(BEIJING),
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let resolver = Arc::new(PlaceResolver::new(provider.clone(), fast_config()));

        let addresses = ["上海", "广州", "深圳", "成都", "武汉", "西安"];
        let mut handles = Vec::new();
        for address in addresses {
            let resolver = Arc::clone(&resolver);
            handles.push(tokio::spawn(
                async move { resolver.resolve(address).await },
            ));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(BEIJING));
        }

        assert_eq!(provider.geocode_calls.load(Ordering::SeqCst), 6);
        assert!(provider.max_in_flight.load(Ordering::SeqCst) <= 2);
    }
}
