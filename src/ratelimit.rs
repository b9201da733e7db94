//! Fixed-window rate limiting for challenge verification attempts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::{RATE_LIMIT_MAX, RATE_LIMIT_WINDOW};

/// Sweep expired buckets every this many permits.
const SWEEP_INTERVAL: u64 = 256;

struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Per-client fixed-window rate limiter.
///
/// The window starts at the first permit for a client and is not sliding:
/// once it elapses, the next permit opens a fresh window with a fresh count.
/// Expired buckets are swept opportunistically every [`SWEEP_INTERVAL`]
/// permits; correctness does not depend on the sweep.
pub struct RateLimiter {
    window: Duration,
    max_permits: u32,
    buckets: Mutex<HashMap<String, Bucket>>,
    permit_count: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Limiter with the protocol defaults (20 permits per 60 s).
    pub fn new() -> Self {
        Self::with_settings(RATE_LIMIT_WINDOW, RATE_LIMIT_MAX)
    }

    /// Limiter with custom settings, for tests and tuning.
    pub fn with_settings(window: Duration, max_permits: u32) -> Self {
        Self {
            window,
            max_permits,
            buckets: Mutex::new(HashMap::new()),
            permit_count: AtomicU64::new(0),
        }
    }

    /// Whether `client_ip` may make another attempt right now.
    pub fn permit(&self, client_ip: &str) -> bool {
        let total = self.permit_count.fetch_add(1, Ordering::Relaxed);
        if total > 0 && total % SWEEP_INTERVAL == 0 {
            self.sweep();
        }

        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        match buckets.get_mut(client_ip) {
            Some(bucket) if now.duration_since(bucket.window_start) <= self.window => {
                bucket.count = bucket.count.saturating_add(1);
                let allowed = bucket.count <= self.max_permits;
                if !allowed {
                    tracing::warn!(
                        component = "agentpayments",
                        client_ip,
                        attempts = bucket.count,
                        max = self.max_permits,
                        "challenge verification rate limit exceeded"
                    );
                }
                allowed
            }
            _ => {
                buckets.insert(
                    client_ip.to_string(),
                    Bucket {
                        window_start: now,
                        count: 1,
                    },
                );
                true
            }
        }
    }

    /// Drop buckets whose window has elapsed. Safe to call at any time.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.retain(|_, b| now.duration_since(b.window_start) <= self.window);
    }

    /// Number of clients currently tracked, for monitoring.
    pub fn tracked_clients(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}
