//! Persistence seam for partner profiles

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::loader;
use crate::model::PartnerProfile;

/// Storage for partner profiles, one per `partner_id`.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Upsert by `partner_id`. An update keeps the stored id and `created_at`.
    async fn save(&self, profile: PartnerProfile) -> Result<PartnerProfile>;

    /// Fetch a profile, active or not.
    async fn get(&self, partner_id: &str) -> Result<PartnerProfile>;

    /// All profiles ordered by `partner_name`.
    async fn list(&self, active_only: bool) -> Result<Vec<PartnerProfile>>;

    /// Hard delete.
    async fn delete(&self, partner_id: &str) -> Result<()>;

    /// Validate an import document and upsert it.
    async fn import(&self, json: &[u8]) -> Result<PartnerProfile> {
        let profile = loader::import(json)?;
        self.save(profile).await
    }
}

#[async_trait]
impl<S: ProfileStore + ?Sized> ProfileStore for Arc<S> {
    async fn save(&self, profile: PartnerProfile) -> Result<PartnerProfile> {
        (**self).save(profile).await
    }

    async fn get(&self, partner_id: &str) -> Result<PartnerProfile> {
        (**self).get(partner_id).await
    }

    async fn list(&self, active_only: bool) -> Result<Vec<PartnerProfile>> {
        (**self).list(active_only).await
    }

    async fn delete(&self, partner_id: &str) -> Result<()> {
        (**self).delete(partner_id).await
    }

    async fn import(&self, json: &[u8]) -> Result<PartnerProfile> {
        (**self).import(json).await
    }
}
