//! Process-wide caches: verified payments and merchant configuration.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;

use crate::config::MerchantConfig;
use crate::error::GateResult;
use crate::{PAYMENT_CACHE_MAX, PAYMENT_CACHE_TTL};

/// Remembers which agent keys have a verified payment behind them.
///
/// Bounded FIFO with lazy TTL expiry: `get` treats entries past the TTL as
/// absent, and an insert past capacity evicts the earliest-inserted live
/// entry. Re-inserting an existing key refreshes its timestamp without
/// changing its position in the eviction order.
pub struct PaymentCache {
    inner: Mutex<PaymentCacheInner>,
    ttl: Duration,
    capacity: usize,
}

struct PaymentCacheInner {
    entries: HashMap<String, Instant>,
    // Insertion order, kept in sync with `entries`.
    order: VecDeque<String>,
}

impl Default for PaymentCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentCache {
    /// Cache with the protocol defaults (1000 entries, 10-minute TTL).
    pub fn new() -> Self {
        Self::with_settings(PAYMENT_CACHE_TTL, PAYMENT_CACHE_MAX)
    }

    /// Cache with custom settings, for tests and tuning.
    pub fn with_settings(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PaymentCacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            ttl,
            capacity,
        }
    }

    /// Whether `key` has a live verified-payment entry.
    pub fn get(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.entries.get(key) {
            Some(at) if at.elapsed() <= self.ttl => true,
            Some(_) => {
                inner.entries.remove(key);
                inner.order.retain(|k| k != key);
                false
            }
            None => false,
        }
    }

    /// Record a verified payment for `key`.
    pub fn set(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(at) = inner.entries.get_mut(key) {
            *at = Instant::now();
            return;
        }
        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.entries.insert(key.to_string(), Instant::now());
        inner.order.push_back(key.to_string());
    }

    /// Number of live entries (expired-but-unswept entries included).
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shares one merchant-config fetch per API key across the process.
///
/// The first caller for a given key runs the fetch; concurrent callers await
/// the same in-flight future. Failed fetches are not cached, so the next
/// request retries. Successful entries live until process restart.
#[derive(Default)]
pub struct MerchantConfigCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<MerchantConfig>>>>,
}

impl MerchantConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached config for `api_key`, fetching it via `fetch` if
    /// this is the first request. The lock guards only the cell lookup; the
    /// fetch itself runs outside it.
    pub async fn get_or_fetch<F, Fut>(&self, api_key: &str, fetch: F) -> GateResult<MerchantConfig>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = GateResult<MerchantConfig>>,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
            cells
                .entry(api_key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        cell.get_or_try_init(fetch).await.cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolanaNetwork;
    use crate::error::GateError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_get_miss_then_hit() {
        let cache = PaymentCache::new();
        assert!(!cache.get("ag_x"));
        cache.set("ag_x");
        assert!(cache.get("ag_x"));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = PaymentCache::with_settings(Duration::from_millis(30), 10);
        cache.set("ag_x");
        assert!(cache.get("ag_x"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(!cache.get("ag_x"));
    }

    #[test]
    fn test_fifo_eviction() {
        let cache = PaymentCache::with_settings(Duration::from_secs(60), 3);
        cache.set("a");
        cache.set("b");
        cache.set("c");
        cache.set("d");
        assert!(!cache.get("a"), "oldest entry should have been evicted");
        assert!(cache.get("b"));
        assert!(cache.get("c"));
        assert!(cache.get("d"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_refresh_keeps_insertion_order() {
        let cache = PaymentCache::with_settings(Duration::from_secs(60), 2);
        cache.set("a");
        cache.set("b");
        // Refreshing "a" does not move it to the back of the queue.
        cache.set("a");
        cache.set("c");
        assert!(!cache.get("a"));
        assert!(cache.get("b"));
        assert!(cache.get("c"));
    }

    #[test]
    fn test_capacity_bounded_under_insert_stream() {
        let cache = PaymentCache::with_settings(Duration::from_secs(60), 10);
        for i in 0..500 {
            cache.set(&format!("ag_{i}"));
            assert!(cache.len() <= 10);
        }
    }

    #[test]
    fn test_lazy_expiry_does_not_skew_eviction_order() {
        let cache = PaymentCache::with_settings(Duration::from_millis(10), 2);
        cache.set("a");
        cache.set("b");
        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.get("a"));
        assert!(!cache.get("b"));
        // Re-inserted keys take a fresh slot in the eviction order.
        cache.set("a");
        cache.set("c");
        cache.set("d");
        assert_eq!(cache.len(), 2);
        assert!(cache.get("c"));
        assert!(cache.get("d"));
    }

    fn config() -> MerchantConfig {
        MerchantConfig {
            wallet_address: "4Nd1mYQriLX3C5YZ6fHxnacqMmW7jqAxBMeUSK7VGJqH".to_string(),
            network: SolanaNetwork::Devnet,
        }
    }

    #[tokio::test]
    async fn test_merchant_config_fetched_once() {
        let cache = MerchantConfigCache::new();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let got = cache
                .get_or_fetch("key-1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(config())
                })
                .await
                .unwrap();
            assert_eq!(got.network, SolanaNetwork::Devnet);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_merchant_config_error_not_cached() {
        let cache = MerchantConfigCache::new();
        let err = cache
            .get_or_fetch("key-1", || async {
                Err::<MerchantConfig, _>(GateError::VerifyService("boom".into()))
            })
            .await;
        assert!(err.is_err());

        let got = cache.get_or_fetch("key-1", || async { Ok(config()) }).await;
        assert!(got.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_api_keys_fetch_separately() {
        let cache = MerchantConfigCache::new();
        let calls = AtomicUsize::new(0);
        for key in ["key-1", "key-2"] {
            cache
                .get_or_fetch(key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(config())
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
