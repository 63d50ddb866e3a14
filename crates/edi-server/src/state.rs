use std::sync::Arc;
use std::time::Duration;

use edi_adapter_db::{DbConnection, DocumentRepository, ProfileRepository};
use edi_pipeline::{AckService, EdiProcessor};
use edi_profile::{ProfileCache, ProfileStore};
use tokio::sync::mpsc;

use crate::config::ResilienceArgs;
use crate::resilience::{Bulkhead, CircuitBreaker, RateLimiter, RetryPolicy, log_state_changes};

/// Everything a handler or middleware needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub processor: EdiProcessor,
    pub acks: AckService,
    pub profiles: Arc<dyn ProfileStore>,
    pub documents: DocumentRepository,
    pub request_timeout: Duration,
    pub bulkhead: Bulkhead,
    pub limiter: Arc<RateLimiter>,
    pub breaker: Arc<CircuitBreaker>,
    pub read_retry: RetryPolicy,
    pub write_retry: RetryPolicy,
}

impl AppState {
    /// Wire the services over a connected database.
    ///
    /// Spawns the task that logs circuit breaker transitions, so it must run inside
    /// a Tokio runtime.
    pub fn new(db: DbConnection, service_name: &str, resilience: &ResilienceArgs) -> Self {
        let profiles: Arc<dyn ProfileStore> = Arc::new(ProfileCache::new(ProfileRepository::new(db.clone())));
        let documents = DocumentRepository::new(db);

        let (changes, drain) = mpsc::unbounded_channel();
        tokio::spawn(log_state_changes(drain));
        let breaker = CircuitBreaker::new("process", resilience.breaker()).with_notifier(changes);

        Self {
            service_name: Arc::from(service_name),
            processor: EdiProcessor::new(profiles.clone(), documents.clone()),
            acks: AckService::new(profiles.clone(), documents.clone()),
            profiles,
            documents,
            request_timeout: resilience.request_timeout(),
            bulkhead: Bulkhead::new(resilience.bulkhead_capacity),
            limiter: Arc::new(RateLimiter::new(resilience.rate_limit(), resilience.rate_limit_per_partner)),
            breaker: Arc::new(breaker),
            read_retry: resilience.read_retry(),
            write_retry: resilience.write_retry(),
        }
    }
}
