//! Mongo-backed repository for the extended vehicle record. Mutations go
//! through the partial update engine's filter/update translation so the
//! ownership scope and the atomic find-and-modify stay in one place.

use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};

use crate::error::{AppError, AppResult};
use crate::store::model::ProfileDetails;
use crate::store::DetailsStore;
use crate::update::{self, DetailsAction};

const COLLECTION: &str = "profile_details";

#[derive(Clone)]
pub struct MongoDetailsStore {
    col: Collection<ProfileDetails>,
}

impl MongoDetailsStore {
    pub fn new(db: &Database) -> Self {
        Self { col: db.collection(COLLECTION) }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let key = IndexModel::builder()
            .keys(doc! { "vehicleKey": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.col.create_index(key).await?;
        Ok(())
    }
}

#[async_trait]
impl DetailsStore for MongoDetailsStore {
    async fn create(&self, details: &ProfileDetails) -> AppResult<ObjectId> {
        let res = self.col.insert_one(details).await?;
        res.inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::upstream("store_error", "insert returned a non-objectid key"))
    }

    async fn find_by_vehicle_key(&self, key: &str) -> AppResult<Option<ProfileDetails>> {
        Ok(self.col.find_one(doc! { "vehicleKey": key }).await?)
    }

    async fn apply(&self, id: ObjectId, owner_email: &str, action: &DetailsAction) -> AppResult<Option<ProfileDetails>> {
        let (filter, update_doc) = update::to_filter_and_update(id, owner_email, action)?;
        let updated = self
            .col
            .find_one_and_update(filter, update_doc)
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn delete_by_vehicle_key(&self, key: &str) -> AppResult<bool> {
        let res = self.col.delete_one(doc! { "vehicleKey": key }).await?;
        Ok(res.deleted_count > 0)
    }
}
