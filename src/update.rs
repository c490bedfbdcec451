//! Partial update engine for the nested driver/route/vehicle collections.
//! ----------------------------------------------------------------------
//! The operation set is a closed tagged enum: dispatch is exhaustive at
//! compile time and an unknown action fails deserialization before any store
//! access. Every operation is scoped by `(document id, owner email)` at the
//! store; a miss reports not-found whether the document is absent or simply
//! not owned by the caller.
//!
//! Two consumers share this module: the mongo store translates an action into
//! an atomic filter + update-document pair, and the in-memory test double
//! applies the same action directly via [`apply`].

use mongodb::bson::{self, doc, oid::ObjectId, Document};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::store::model::{Driver, ProfileDetails, RouteLeg, VehicleInfo};

/// Wire shape: `{"id": ..., "action": ..., "payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "camelCase")]
pub enum DetailsAction {
    #[serde(rename_all = "camelCase")]
    UpdateDriver { driver_id: String, updates: Driver },
    #[serde(rename_all = "camelCase")]
    AddDriver { driver_object: Driver },
    #[serde(rename_all = "camelCase")]
    RemoveDriver { driver_id: String },
    #[serde(rename_all = "camelCase")]
    AddRoute { route_object: RouteLeg },
    #[serde(rename_all = "camelCase")]
    RemoveRoute { route_id: String },
    /// Wholesale replacement of the vehicle sub-object, not a merge: fields
    /// the payload omits reset to their defaults, images included.
    #[serde(rename_all = "camelCase")]
    UpdateVehicleInfo {
        name: Option<String>,
        number: Option<String>,
        capacity: Option<u32>,
    },
    AddVehicleImage { url: String },
    RemoveVehicleImage { url: String },
}

impl DetailsAction {
    fn replacement_vehicle(name: &Option<String>, number: &Option<String>, capacity: &Option<u32>) -> VehicleInfo {
        VehicleInfo {
            name: name.clone().unwrap_or_default(),
            number: number.clone().unwrap_or_default(),
            capacity: capacity.unwrap_or_default(),
            images: Vec::new(),
        }
    }
}

/// Ownership-scoped filter plus the update document for the atomic
/// find-and-modify path. The filter always carries both the document id and
/// the owner email; `UpdateDriver` additionally requires the target driver to
/// exist so a missing driver surfaces as not-found.
pub fn to_filter_and_update(id: ObjectId, owner_email: &str, action: &DetailsAction) -> AppResult<(Document, Document)> {
    let base = doc! { "_id": id, "ownerEmail": crate::ident::normalize_email(owner_email) };
    let now = bson::DateTime::now();
    let pair = match action {
        DetailsAction::UpdateDriver { driver_id, updates } => {
            // Replace the matched sub-record in place, keeping the caller's id
            let mut replacement = updates.clone();
            replacement.id = driver_id.clone();
            let mut filter = base;
            filter.insert("drivers._id", driver_id.as_str());
            (filter, doc! { "$set": { "drivers.$": encode(&replacement)?, "updatedAt": now } })
        }
        DetailsAction::AddDriver { driver_object } => {
            (base, doc! { "$push": { "drivers": encode(driver_object)? }, "$set": { "updatedAt": now } })
        }
        DetailsAction::RemoveDriver { driver_id } => {
            (base, doc! { "$pull": { "drivers": { "_id": driver_id.as_str() } }, "$set": { "updatedAt": now } })
        }
        DetailsAction::AddRoute { route_object } => {
            (base, doc! { "$push": { "routes": encode(route_object)? }, "$set": { "updatedAt": now } })
        }
        DetailsAction::RemoveRoute { route_id } => {
            (base, doc! { "$pull": { "routes": { "_id": route_id.as_str() } }, "$set": { "updatedAt": now } })
        }
        DetailsAction::UpdateVehicleInfo { name, number, capacity } => {
            let vehicle = DetailsAction::replacement_vehicle(name, number, capacity);
            (base, doc! { "$set": { "vehicle": encode(&vehicle)?, "updatedAt": now } })
        }
        DetailsAction::AddVehicleImage { url } => {
            (base, doc! { "$push": { "vehicle.images": url.as_str() }, "$set": { "updatedAt": now } })
        }
        DetailsAction::RemoveVehicleImage { url } => {
            (base, doc! { "$pull": { "vehicle.images": url.as_str() }, "$set": { "updatedAt": now } })
        }
    };
    Ok(pair)
}

fn encode<T: Serialize>(value: &T) -> AppResult<bson::Bson> {
    bson::to_bson(value).map_err(|e| AppError::upstream("encode_error".into(), e.to_string()))
}

/// Outcome of applying an action in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// `UpdateDriver` against a driver id not present in the document.
    DriverMissing,
}

/// Apply an action directly to a details document. Removals of absent
/// sub-records are no-op successes; only `UpdateDriver` can miss.
pub fn apply(details: &mut ProfileDetails, action: &DetailsAction) -> ApplyOutcome {
    match action {
        DetailsAction::UpdateDriver { driver_id, updates } => {
            let Some(slot) = details.drivers.iter_mut().find(|d| d.id == *driver_id) else {
                return ApplyOutcome::DriverMissing;
            };
            let mut replacement = updates.clone();
            replacement.id = driver_id.clone();
            *slot = replacement;
        }
        DetailsAction::AddDriver { driver_object } => details.drivers.push(driver_object.clone()),
        DetailsAction::RemoveDriver { driver_id } => details.drivers.retain(|d| d.id != *driver_id),
        DetailsAction::AddRoute { route_object } => details.routes.push(route_object.clone()),
        DetailsAction::RemoveRoute { route_id } => details.routes.retain(|r| r.id != *route_id),
        DetailsAction::UpdateVehicleInfo { name, number, capacity } => {
            details.vehicle = DetailsAction::replacement_vehicle(name, number, capacity);
        }
        DetailsAction::AddVehicleImage { url } => details.vehicle.images.push(url.clone()),
        DetailsAction::RemoveVehicleImage { url } => details.vehicle.images.retain(|u| u != url),
    }
    details.updated_at = bson::DateTime::now();
    ApplyOutcome::Applied
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod update_tests;
