//! Document models for the two collections backing the service.
//! Field names stay camelCase on the wire and in the store so existing
//! frontend payloads and documents keep working.

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use crate::ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Enabled,
    Disabled,
}

/// Primary registration record, one per identity. `ownerEmail` is the
/// normalized identity and carries a unique index; `vehicleKey` is the
/// derived secondary lookup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub owner_email: String,
    pub username: String,
    pub status: ProfileStatus,

    pub full_name: String,
    pub driving_license: String,
    pub road_permit: String,
    pub national_id: String,
    pub gender: String,
    pub contact_number: String,
    pub vehicle_number: String,
    pub vehicle_key: String,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Profile {
    /// Build a fresh profile from validated registration fields. Status starts
    /// disabled; re-submission flips it to enabled.
    pub fn new(owner_email: &str, username: &str, fields: RegistrationFields) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            owner_email: ident::normalize_email(owner_email),
            username: username.to_string(),
            status: ProfileStatus::Disabled,
            vehicle_key: ident::vehicle_key(&fields.vehicle_number),
            full_name: fields.full_name,
            driving_license: fields.driving_license,
            road_permit: fields.road_permit,
            national_id: fields.national_id,
            gender: fields.gender,
            contact_number: fields.contact_number,
            vehicle_number: fields.vehicle_number,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the writable fields from a re-submission and force enabled.
    pub fn resubmit(&mut self, fields: RegistrationFields) {
        self.vehicle_key = ident::vehicle_key(&fields.vehicle_number);
        self.full_name = fields.full_name;
        self.driving_license = fields.driving_license;
        self.road_permit = fields.road_permit;
        self.national_id = fields.national_id;
        self.gender = fields.gender;
        self.contact_number = fields.contact_number;
        self.vehicle_number = fields.vehicle_number;
        self.status = ProfileStatus::Enabled;
        self.updated_at = DateTime::now();
    }
}

/// The mandatory registration fields; all must be present and non-blank for a
/// submission to be accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFields {
    pub full_name: String,
    pub driving_license: String,
    pub road_permit: String,
    pub national_id: String,
    pub gender: String,
    pub contact_number: String,
    pub vehicle_number: String,
}

impl RegistrationFields {
    /// Names of required fields that are missing or blank, in declaration order.
    pub fn blank_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let checks: [(&'static str, &str); 7] = [
            ("fullName", &self.full_name),
            ("drivingLicense", &self.driving_license),
            ("roadPermit", &self.road_permit),
            ("nationalId", &self.national_id),
            ("gender", &self.gender),
            ("contactNumber", &self.contact_number),
            ("vehicleNumber", &self.vehicle_number),
        ];
        for (name, value) in checks {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        missing
    }
}

fn new_sub_id() -> String {
    ObjectId::new().to_hex()
}

/// One scheduled leg of the vehicle's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLeg {
    #[serde(rename = "_id", default = "new_sub_id")]
    pub id: String,
    pub from: String,
    pub to: String,
    pub departure_time: String,
}

/// One driver attached to the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    #[serde(rename = "_id", default = "new_sub_id")]
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub contact_number: String,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleInfo {
    pub name: String,
    pub number: String,
    pub capacity: u32,
    pub images: Vec<String>,
}

/// Extended record holding the nested route/driver/image collections, keyed
/// by vehicle key and owned by the same normalized email as the Profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDetails {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub vehicle_key: String,
    pub owner_email: String,
    #[serde(default)]
    pub routes: Vec<RouteLeg>,
    #[serde(default)]
    pub drivers: Vec<Driver>,
    #[serde(default)]
    pub vehicle: VehicleInfo,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ProfileDetails {
    pub fn new(vehicle_key: &str, owner_email: &str) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            vehicle_key: vehicle_key.to_string(),
            owner_email: ident::normalize_email(owner_email),
            routes: Vec::new(),
            drivers: Vec::new(),
            vehicle: VehicleInfo::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
