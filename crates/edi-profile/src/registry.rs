//! Read-through profile cache with TTL expiry

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::Result;
use crate::model::PartnerProfile;
use crate::store::ProfileStore;

/// Default time a cached profile stays fresh.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct CachedProfile {
    profile: PartnerProfile,
    loaded_at: Instant,
}

/// Caches `get` results in front of another store.
///
/// Writes go straight to the inner store and drop the cached entry, so a cache hit
/// is never older than the TTL or the last local write.
pub struct ProfileCache<S> {
    inner: S,
    entries: DashMap<String, CachedProfile>,
    ttl: Duration,
}

impl<S: ProfileStore> ProfileCache<S> {
    pub fn new(inner: S) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    pub fn with_ttl(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Drop one cached profile.
    pub fn invalidate(&self, partner_id: &str) {
        self.entries.remove(partner_id);
    }

    /// Drop every cached profile.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn fresh(&self, partner_id: &str) -> Option<PartnerProfile> {
        let entry = self.entries.get(partner_id)?;
        if entry.loaded_at.elapsed() < self.ttl {
            return Some(entry.profile.clone());
        }
        drop(entry);
        trace!(partner_id, "Cached profile expired");
        self.entries.remove(partner_id);
        None
    }
}

#[async_trait]
impl<S: ProfileStore> ProfileStore for ProfileCache<S> {
    async fn save(&self, profile: PartnerProfile) -> Result<PartnerProfile> {
        let partner_id = profile.partner_id.clone();
        let saved = self.inner.save(profile).await;
        self.invalidate(&partner_id);
        saved
    }

    async fn get(&self, partner_id: &str) -> Result<PartnerProfile> {
        if let Some(profile) = self.fresh(partner_id) {
            debug!(partner_id, "Cache hit for profile");
            return Ok(profile);
        }

        let profile = self.inner.get(partner_id).await?;
        self.entries.insert(
            partner_id.to_string(),
            CachedProfile {
                profile: profile.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(profile)
    }

    async fn list(&self, active_only: bool) -> Result<Vec<PartnerProfile>> {
        self.inner.list(active_only).await
    }

    async fn delete(&self, partner_id: &str) -> Result<()> {
        let deleted = self.inner.delete(partner_id).await;
        self.invalidate(partner_id);
        deleted
    }
}
