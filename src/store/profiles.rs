//! Mongo-backed profile repository.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};

use crate::error::{AppError, AppResult};
use crate::ident;
use crate::store::model::Profile;
use crate::store::ProfileStore;

const COLLECTION: &str = "profiles";

#[derive(Clone)]
pub struct MongoProfileStore {
    col: Collection<Profile>,
}

impl MongoProfileStore {
    pub fn new(db: &Database) -> Self {
        Self { col: db.collection(COLLECTION) }
    }

    /// Unique index on the identity, plus the secondary vehicle-key lookup.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let owner = IndexModel::builder()
            .keys(doc! { "ownerEmail": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let key = IndexModel::builder()
            .keys(doc! { "vehicleKey": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.col.create_index(owner).await?;
        self.col.create_index(key).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MongoProfileStore {
    async fn find_by_identity(&self, email: &str) -> AppResult<Option<Profile>> {
        let email = ident::normalize_email(email);
        Ok(self.col.find_one(doc! { "ownerEmail": email }).await?)
    }

    async fn find_by_vehicle_key(&self, key: &str) -> AppResult<Option<Profile>> {
        Ok(self.col.find_one(doc! { "vehicleKey": key }).await?)
    }

    async fn find_by_key_or_id(&self, id: &str) -> AppResult<Option<Profile>> {
        if let Some(found) = self.col.find_one(doc! { "vehicleKey": id }).await? {
            return Ok(Some(found));
        }
        // Fall back to the document id when the segment parses as one
        match ObjectId::parse_str(id) {
            Ok(oid) => Ok(self.col.find_one(doc! { "_id": oid }).await?),
            Err(_) => Ok(None),
        }
    }

    async fn list(&self, owner_email: Option<&str>) -> AppResult<Vec<Profile>> {
        let filter = match owner_email {
            Some(email) => doc! { "ownerEmail": ident::normalize_email(email) },
            None => doc! {},
        };
        let cursor = self.col.find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert(&self, profile: &Profile) -> AppResult<ObjectId> {
        let res = self.col.insert_one(profile).await?;
        res.inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::upstream("store_error", "insert returned a non-objectid key"))
    }

    async fn replace(&self, profile: &Profile) -> AppResult<()> {
        let Some(id) = profile.id else {
            return Err(AppError::upstream("store_error", "replace requires a persisted profile"));
        };
        self.col.replace_one(doc! { "_id": id }, profile).await?;
        Ok(())
    }

    async fn delete(&self, id: ObjectId) -> AppResult<bool> {
        let res = self.col.delete_one(doc! { "_id": id }).await?;
        Ok(res.deleted_count > 0)
    }

    async fn delete_by_vehicle_key(&self, key: &str) -> AppResult<bool> {
        let res = self.col.delete_one(doc! { "vehicleKey": key }).await?;
        Ok(res.deleted_count > 0)
    }
}
