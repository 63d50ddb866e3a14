//! Partner profiles persisted in `edi_partner_profiles`.

use async_trait::async_trait;
use edi_profile::{PartnerProfile, ProfileStore};
use tracing::{debug, warn};

use crate::connection::DbConnection;
use crate::records::{RowReader, json_value, now, timestamp_value, uuid_value};
use crate::schema::Row;
use crate::sql::{Query, SortOrder};
use crate::tables::PARTNER_PROFILES;
use crate::{Error, Result};

/// [`ProfileStore`] over the database; one row per `partner_id`.
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    db: DbConnection,
}

impl ProfileRepository {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    async fn upsert(&self, mut profile: PartnerProfile) -> Result<PartnerProfile> {
        let mut tx = self.db.begin_transaction().await?;
        let query = Query::new().filter("partner_id", profile.partner_id.as_str());
        let existing = match tx.select_one(PARTNER_PROFILES, &query).await? {
            Some(row) => Some(profile_from_row(&row)?),
            None => None,
        };

        profile.updated_at = now();
        match &existing {
            Some(stored) => {
                profile.id = stored.id;
                profile.created_at = stored.created_at;
                profile.version = stored.version + 1;
                let filter = query.filter.clone();
                tx.update_rows(PARTNER_PROFILES, &filter, &profile_to_row(&profile)?)
                    .await?;
            }
            None => {
                profile.created_at = profile.updated_at;
                profile.version = 1;
                tx.insert_row(PARTNER_PROFILES, profile_to_row(&profile)?).await?;
            }
        }
        tx.commit().await?;

        debug!(
            partner_id = %profile.partner_id,
            version = profile.version,
            created = existing.is_none(),
            "profile saved"
        );
        Ok(profile)
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn save(&self, profile: PartnerProfile) -> edi_profile::Result<PartnerProfile> {
        self.upsert(profile).await.map_err(into_profile_error)
    }

    async fn get(&self, partner_id: &str) -> edi_profile::Result<PartnerProfile> {
        let query = Query::new().filter("partner_id", partner_id);
        let row = self
            .db
            .select_one(PARTNER_PROFILES, &query)
            .await
            .map_err(into_profile_error)?
            .ok_or_else(|| edi_profile::Error::not_found(partner_id))?;
        let profile = profile_from_row(&row).map_err(into_profile_error)?;
        if !profile.active {
            warn!(partner_id, "profile is inactive");
        }
        Ok(profile)
    }

    async fn list(&self, active_only: bool) -> edi_profile::Result<Vec<PartnerProfile>> {
        let mut query = Query::new()
            .order_by("partner_name", SortOrder::Asc)
            .order_by("partner_id", SortOrder::Asc);
        if active_only {
            query = query.filter("active", true);
        }
        let rows = self
            .db
            .select_rows(PARTNER_PROFILES, &query)
            .await
            .map_err(into_profile_error)?;
        rows.iter()
            .map(|row| profile_from_row(row).map_err(into_profile_error))
            .collect()
    }

    async fn delete(&self, partner_id: &str) -> edi_profile::Result<()> {
        let filter = Query::new().filter("partner_id", partner_id).filter;
        let deleted = self
            .db
            .delete_rows(PARTNER_PROFILES, &filter)
            .await
            .map_err(into_profile_error)?;
        if deleted == 0 {
            return Err(edi_profile::Error::not_found(partner_id));
        }
        debug!(partner_id, "profile deleted");
        Ok(())
    }
}

fn profile_to_row(profile: &PartnerProfile) -> Result<Row> {
    Ok(Row::from([
        ("id".to_string(), uuid_value(profile.id)),
        ("partner_id".to_string(), profile.partner_id.as_str().into()),
        ("partner_name".to_string(), profile.partner_name.as_str().into()),
        ("description".to_string(), profile.description.clone().into()),
        ("active".to_string(), profile.active.into()),
        ("configuration".to_string(), json_value(&profile.configuration)?),
        ("created_at".to_string(), timestamp_value(profile.created_at).into()),
        ("updated_at".to_string(), timestamp_value(profile.updated_at).into()),
        ("version".to_string(), profile.version.into()),
    ]))
}

fn profile_from_row(row: &Row) -> Result<PartnerProfile> {
    let reader = RowReader::new(PARTNER_PROFILES, row);
    Ok(PartnerProfile {
        id: reader.uuid("id")?,
        partner_id: reader.text("partner_id")?,
        partner_name: reader.text("partner_name")?,
        description: reader.opt_text("description")?,
        active: reader.boolean("active")?,
        configuration: reader.json("configuration")?,
        created_at: reader.timestamp("created_at")?,
        updated_at: reader.timestamp("updated_at")?,
        version: reader.integer("version")?,
    })
}

fn into_profile_error(err: Error) -> edi_profile::Error {
    match err {
        Error::Conflict { details } => edi_profile::Error::Conflict(details),
        Error::NotFound { id, .. } => edi_profile::Error::not_found(id),
        err if err.is_unavailable() => edi_profile::Error::Unavailable(err.to_string()),
        other => edi_profile::Error::storage(other.to_string()),
    }
}
