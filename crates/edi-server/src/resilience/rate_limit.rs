use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::time::Instant;
use tracing::debug;

/// Bucket count that triggers eviction.
pub const MAX_BUCKETS: usize = 10_000;
/// Buckets left after eviction.
pub const RETAINED_BUCKETS: usize = 5_000;

/// Refill rate and capacity of a token bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub requests_per_second: f64,
    pub burst: u32,
}

impl RateLimit {
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self {
            requests_per_second,
            burst,
        }
    }
}

impl From<edi_profile::RateLimitConfig> for RateLimit {
    fn from(config: edi_profile::RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst)
    }
}

/// Starts full; refills continuously at `requests_per_second` up to `burst`.
#[derive(Debug)]
pub struct TokenBucket {
    limit: RateLimit,
    tokens: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            tokens: f64::from(limit.burst),
            refilled_at: Instant::now(),
        }
    }

    /// Take one token if available.
    pub fn try_take(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        let capacity = f64::from(self.limit.burst);
        self.tokens = (self.tokens + elapsed * self.limit.requests_per_second.max(0.0)).min(capacity);
        self.refilled_at = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

type SharedBucket = Arc<Mutex<TokenBucket>>;

/// Token buckets keyed by partner, or a single shared bucket.
#[derive(Debug)]
pub struct RateLimiter {
    default_limit: RateLimit,
    per_partner: bool,
    buckets: RwLock<HashMap<String, SharedBucket>>,
}

impl RateLimiter {
    pub fn new(default_limit: RateLimit, per_partner: bool) -> Self {
        Self {
            default_limit,
            per_partner,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_limit(&self) -> RateLimit {
        self.default_limit
    }

    pub fn per_partner(&self) -> bool {
        self.per_partner
    }

    /// Bucket key for a request from `partner_id`.
    pub fn key(&self, partner_id: Option<&str>) -> String {
        match partner_id {
            Some(partner_id) if self.per_partner => partner_id.to_string(),
            Some(_) => "*".to_string(),
            None => "anonymous".to_string(),
        }
    }

    /// Whether a bucket exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Admit or refuse one request. A missing bucket is created with `limit`.
    pub fn check(&self, key: &str, limit: Option<RateLimit>) -> bool {
        let bucket = self.bucket(key, limit.unwrap_or(self.default_limit));
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_take()
    }

    pub fn len(&self) -> usize {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket(&self, key: &str, limit: RateLimit) -> SharedBucket {
        if let Some(bucket) = self
            .buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return bucket.clone();
        }

        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        // another request may have created it while we waited for the write lock
        if let Some(bucket) = buckets.get(key) {
            return bucket.clone();
        }
        if buckets.len() >= MAX_BUCKETS {
            let excess = buckets.len() - RETAINED_BUCKETS;
            let victims: Vec<String> = buckets.keys().take(excess).cloned().collect();
            for victim in &victims {
                buckets.remove(victim);
            }
            debug!(evicted = victims.len(), "rate limit buckets evicted");
        }
        let bucket = Arc::new(Mutex::new(TokenBucket::new(limit)));
        buckets.insert(key.to_string(), bucket.clone());
        bucket
    }
}
