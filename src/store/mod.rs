//! Document-store collaborators.
//! -----------------------------
//! One repository trait per entity, constructed once at process start and
//! injected into the handlers; the mongo implementations are the only place
//! that talks to the driver. Ownership scoping lives in the repository
//! queries so no handler can forget it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::{Client, Database};

use crate::config::Config;
use crate::error::AppResult;
use crate::update::DetailsAction;

pub mod model;
pub mod profiles;
pub mod details;
#[cfg(test)]
pub mod memory;

use model::{Profile, ProfileDetails};

/// Registration records, keyed by normalized owner email (unique) with the
/// derived vehicle key as a secondary lookup.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_identity(&self, email: &str) -> AppResult<Option<Profile>>;
    async fn find_by_vehicle_key(&self, key: &str) -> AppResult<Option<Profile>>;
    /// Resolve by vehicle key first, falling back to the document id.
    async fn find_by_key_or_id(&self, id: &str) -> AppResult<Option<Profile>>;
    async fn list(&self, owner_email: Option<&str>) -> AppResult<Vec<Profile>>;
    async fn insert(&self, profile: &Profile) -> AppResult<ObjectId>;
    async fn replace(&self, profile: &Profile) -> AppResult<()>;
    async fn delete(&self, id: ObjectId) -> AppResult<bool>;
    async fn delete_by_vehicle_key(&self, key: &str) -> AppResult<bool>;
}

/// Extended records with the nested driver/route/image collections.
#[async_trait]
pub trait DetailsStore: Send + Sync {
    async fn create(&self, details: &ProfileDetails) -> AppResult<ObjectId>;
    async fn find_by_vehicle_key(&self, key: &str) -> AppResult<Option<ProfileDetails>>;
    /// Apply one named mutation atomically, scoped by `(id, owner_email)`.
    /// `None` means no owned document matched; the caller cannot tell a
    /// missing document from one owned by somebody else.
    async fn apply(&self, id: ObjectId, owner_email: &str, action: &DetailsAction) -> AppResult<Option<ProfileDetails>>;
    async fn delete_by_vehicle_key(&self, key: &str) -> AppResult<bool>;
}

/// Connect to the document store and build both repositories, creating the
/// unique indexes on first run.
pub async fn connect(cfg: &Config) -> Result<(profiles::MongoProfileStore, details::MongoDetailsStore)> {
    let client = Client::with_uri_str(&cfg.mongodb_uri)
        .await
        .with_context(|| format!("while connecting to document store at {}", cfg.mongodb_uri))?;
    let db: Database = client.database(&cfg.db_name);

    let profiles = profiles::MongoProfileStore::new(&db);
    profiles.ensure_indexes().await.context("while creating profile indexes")?;
    let details = details::MongoDetailsStore::new(&db);
    details.ensure_indexes().await.context("while creating profile-details indexes")?;

    Ok((profiles, details))
}
