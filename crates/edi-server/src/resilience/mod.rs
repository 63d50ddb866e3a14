//! Guards in front of the endpoints: concurrency bound, per-partner rate limits,
//! circuit breaking and retries.
//!
//! Time is read from `tokio::time`, so paused-clock tests drive every window.

mod bulkhead;
mod circuit_breaker;
mod rate_limit;
mod retry;

pub use bulkhead::{Bulkhead, BulkheadPermit};
pub use circuit_breaker::{Admission, BreakerSettings, BreakerState, CircuitBreaker, StateChange, log_state_changes};
pub use rate_limit::{MAX_BUCKETS, RETAINED_BUCKETS, RateLimit, RateLimiter, TokenBucket};
pub use retry::RetryPolicy;
