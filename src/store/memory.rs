//! In-memory repository doubles for handler and gate tests. They enforce the
//! same unique-key and ownership rules as the mongo implementations, and the
//! details double routes mutations through the same pure application the
//! engine exposes, so both paths stay in step.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use parking_lot::Mutex;

use crate::error::{AppError, AppResult};
use crate::ident;
use crate::store::model::{Profile, ProfileDetails};
use crate::store::{DetailsStore, ProfileStore};
use crate::update::{self, ApplyOutcome, DetailsAction};

#[derive(Default)]
pub struct MemoryProfileStore {
    rows: Mutex<Vec<Profile>>,
    /// When set, every read fails; used to exercise the gate's fail-open path.
    pub fail_reads: std::sync::atomic::AtomicBool,
}

impl MemoryProfileStore {
    fn check_unavailable(&self) -> AppResult<()> {
        if self.fail_reads.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(AppError::upstream("store_error", "store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_by_identity(&self, email: &str) -> AppResult<Option<Profile>> {
        self.check_unavailable()?;
        let email = ident::normalize_email(email);
        Ok(self.rows.lock().iter().find(|p| p.owner_email == email).cloned())
    }

    async fn find_by_vehicle_key(&self, key: &str) -> AppResult<Option<Profile>> {
        self.check_unavailable()?;
        Ok(self.rows.lock().iter().find(|p| p.vehicle_key == key).cloned())
    }

    async fn find_by_key_or_id(&self, id: &str) -> AppResult<Option<Profile>> {
        self.check_unavailable()?;
        let rows = self.rows.lock();
        if let Some(p) = rows.iter().find(|p| p.vehicle_key == id) {
            return Ok(Some(p.clone()));
        }
        let oid = ObjectId::parse_str(id).ok();
        Ok(rows.iter().find(|p| p.id == oid).cloned())
    }

    async fn list(&self, owner_email: Option<&str>) -> AppResult<Vec<Profile>> {
        self.check_unavailable()?;
        let rows = self.rows.lock();
        Ok(match owner_email {
            Some(email) => {
                let email = ident::normalize_email(email);
                rows.iter().filter(|p| p.owner_email == email).cloned().collect()
            }
            None => rows.clone(),
        })
    }

    async fn insert(&self, profile: &Profile) -> AppResult<ObjectId> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|p| p.owner_email == profile.owner_email || p.vehicle_key == profile.vehicle_key) {
            return Err(AppError::conflict("duplicate_key", "record already exists"));
        }
        let mut stored = profile.clone();
        let id = ObjectId::new();
        stored.id = Some(id);
        rows.push(stored);
        Ok(id)
    }

    async fn replace(&self, profile: &Profile) -> AppResult<()> {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|p| p.id == profile.id) {
            Some(slot) => {
                *slot = profile.clone();
                Ok(())
            }
            None => Err(AppError::upstream("store_error", "replace requires a persisted profile")),
        }
    }

    async fn delete(&self, id: ObjectId) -> AppResult<bool> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|p| p.id != Some(id));
        Ok(rows.len() < before)
    }

    async fn delete_by_vehicle_key(&self, key: &str) -> AppResult<bool> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|p| p.vehicle_key != key);
        Ok(rows.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryDetailsStore {
    rows: Mutex<Vec<ProfileDetails>>,
}

#[async_trait]
impl DetailsStore for MemoryDetailsStore {
    async fn create(&self, details: &ProfileDetails) -> AppResult<ObjectId> {
        let mut rows = self.rows.lock();
        if rows.iter().any(|d| d.vehicle_key == details.vehicle_key) {
            return Err(AppError::conflict("duplicate_key", "record already exists"));
        }
        let mut stored = details.clone();
        let id = ObjectId::new();
        stored.id = Some(id);
        rows.push(stored);
        Ok(id)
    }

    async fn find_by_vehicle_key(&self, key: &str) -> AppResult<Option<ProfileDetails>> {
        Ok(self.rows.lock().iter().find(|d| d.vehicle_key == key).cloned())
    }

    async fn apply(&self, id: ObjectId, owner_email: &str, action: &DetailsAction) -> AppResult<Option<ProfileDetails>> {
        let owner = ident::normalize_email(owner_email);
        let mut rows = self.rows.lock();
        let Some(slot) = rows.iter_mut().find(|d| d.id == Some(id) && d.owner_email == owner) else {
            return Ok(None);
        };
        match update::apply(slot, action) {
            ApplyOutcome::Applied => Ok(Some(slot.clone())),
            ApplyOutcome::DriverMissing => Ok(None),
        }
    }

    async fn delete_by_vehicle_key(&self, key: &str) -> AppResult<bool> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|d| d.vehicle_key != key);
        Ok(rows.len() < before)
    }
}
