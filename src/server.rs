//!
//! sawari HTTP server
//! ------------------
//! This module defines the Axum-based HTTP API for the registration service.
//!
//! Responsibilities:
//! - Dependency wiring: repositories, session resolver and image host are
//!   constructed once at startup and injected into every handler.
//! - The access-gate middleware on all navigational routes.
//! - Registration upsert, profile read/update/delete, the combined vehicle
//!   record, and the partial-update dispatch for nested sub-documents.
//! - JSON envelope: `{"success": true, "data": ...}` on the happy path,
//!   `{"success": false, "error": {...}}` via the error type otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Html;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::gate::{self, GatePolicy};
use crate::ident;
use crate::identity::{JwtSessionResolver, Principal, SessionResolver};
use crate::imagehost::{ImageHost, ImgbbClient};
use crate::store::model::{Driver, Profile, ProfileDetails, RegistrationFields, RouteLeg, VehicleInfo};
use crate::store::{self, DetailsStore, ProfileStore};
use crate::update::DetailsAction;

/// Shared server state injected into all handlers. Collaborators sit behind
/// trait objects so tests can substitute in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileStore>,
    pub details: Arc<dyn DetailsStore>,
    pub resolver: Arc<dyn SessionResolver>,
    pub images: Option<Arc<dyn ImageHost>>,
    pub gate: Arc<GatePolicy>,
}

/// Start the HTTP server: load configuration, connect the document store,
/// build state and mount all routes behind the gate middleware.
pub async fn run() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;
    let (profiles, details) = store::connect(&cfg).await?;

    let resolver = JwtSessionResolver::new(&cfg.session_secret, &cfg.session_cookie);
    let images: Option<Arc<dyn ImageHost>> = match &cfg.imgbb_key {
        Some(key) => Some(Arc::new(ImgbbClient::new(key.clone()))),
        None => {
            info!("image host key not configured, /api/upload disabled");
            None
        }
    };

    let state = AppState {
        profiles: Arc::new(profiles),
        details: Arc::new(details),
        resolver: Arc::new(resolver),
        images,
        gate: Arc::new(GatePolicy::new(cfg.gate_fail_open)),
    };

    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_page))
        .route("/form", get(form_page))
        .route("/auth", get(auth_page))
        .route("/api/vehicle", get(list_vehicles).post(upsert_vehicle))
        .route(
            "/api/vehicle/{id}",
            get(get_vehicle_record).post(create_vehicle_details).delete(delete_vehicle_record),
        )
        .route("/api/profile/{id}", get(get_profile).put(update_profile).delete(delete_profile))
        .route("/api/vehicleDetails", put(update_vehicle_details))
        .route("/api/details", get(my_details))
        .route("/api/upload", post(upload_image))
        .layer(axum::middleware::from_fn_with_state(state.clone(), gate::gate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn require_session(state: &AppState, headers: &HeaderMap) -> AppResult<Principal> {
    state
        .resolver
        .resolve(headers)
        .ok_or_else(|| AppError::unauthenticated("no_session", "not authenticated"))
}

fn ok_data(data: impl serde::Serialize) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true, "data": data })))
}

fn ok_message(message: &str, data: impl serde::Serialize) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true, "message": message, "data": data })))
}

fn created(message: &str, data: impl serde::Serialize) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "success": true, "message": message, "data": data })))
}

// ---- Registration upsert -------------------------------------------------

/// POST /api/vehicle: the registration form submission. One profile per
/// identity; a second submission overwrites the writable fields and forces
/// the profile enabled.
async fn upsert_vehicle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(fields): Json<RegistrationFields>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let caller = require_session(&state, &headers)?;

    let blanks = fields.blank_fields();
    if !blanks.is_empty() {
        return Err(AppError::user(
            "missing_fields".into(),
            format!("required fields missing: {}", blanks.join(", ")),
        ));
    }

    match state.profiles.find_by_identity(&caller.email).await? {
        Some(mut existing) => {
            existing.resubmit(fields);
            state.profiles.replace(&existing).await?;
            Ok(ok_message("updated vehicle profile", existing))
        }
        None => {
            let mut profile = Profile::new(&caller.email, &caller.username, fields);
            let id = state.profiles.insert(&profile).await?;
            profile.id = Some(id);
            Ok(created("created vehicle profile", profile))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    gmail: Option<String>,
}

/// GET /api/vehicle?gmail=: list profiles, optionally filtered by identity.
async fn list_vehicles(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let rows = state.profiles.list(query.gmail.as_deref()).await?;
    Ok(ok_data(rows))
}

// ---- Profile by id -------------------------------------------------------

/// GET /api/profile/{id}: resolve by vehicle key first, then document id.
async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    match state.profiles.find_by_key_or_id(&id).await? {
        Some(profile) => Ok(ok_data(profile)),
        None => Err(AppError::not_found("not_found", "vehicle not found")),
    }
}

/// Writable fields of a profile update; anything else in the body is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdate {
    full_name: Option<String>,
    driving_license: Option<String>,
    road_permit: Option<String>,
    national_id: Option<String>,
    gender: Option<String>,
    contact_number: Option<String>,
    vehicle_number: Option<String>,
}

impl ProfileUpdate {
    fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.driving_license.is_none()
            && self.road_permit.is_none()
            && self.national_id.is_none()
            && self.gender.is_none()
            && self.contact_number.is_none()
            && self.vehicle_number.is_none()
    }
}

async fn find_owned_profile(state: &AppState, caller: &Principal, id: &str) -> AppResult<Profile> {
    let Some(profile) = state.profiles.find_by_key_or_id(id).await? else {
        return Err(AppError::not_found("not_found", "vehicle not found"));
    };
    if profile.owner_email != caller.email {
        return Err(AppError::forbidden("not_owner", "you can only modify your own vehicle"));
    }
    Ok(profile)
}

/// PUT /api/profile/{id}: owner-only partial update of the allowed fields.
async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let caller = require_session(&state, &headers)?;
    if update.is_empty() {
        return Err(AppError::user("no_fields", "no valid fields to update"));
    }
    let mut profile = find_owned_profile(&state, &caller, &id).await?;

    if let Some(v) = update.full_name {
        profile.full_name = v;
    }
    if let Some(v) = update.driving_license {
        profile.driving_license = v;
    }
    if let Some(v) = update.road_permit {
        profile.road_permit = v;
    }
    if let Some(v) = update.national_id {
        profile.national_id = v;
    }
    if let Some(v) = update.gender {
        profile.gender = v;
    }
    if let Some(v) = update.contact_number {
        profile.contact_number = v;
    }
    if let Some(v) = update.vehicle_number {
        // Keep the derived key in sync with the plate number
        profile.vehicle_key = ident::vehicle_key(&v);
        profile.vehicle_number = v;
    }
    profile.updated_at = mongodb::bson::DateTime::now();
    state.profiles.replace(&profile).await?;
    Ok(ok_message("vehicle profile updated", profile))
}

/// DELETE /api/profile/{id}: owner-only.
async fn delete_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let caller = require_session(&state, &headers)?;
    let profile = find_owned_profile(&state, &caller, &id).await?;
    let Some(oid) = profile.id else {
        return Err(AppError::upstream("store_error", "stored profile missing id"));
    };
    state.profiles.delete(oid).await?;
    Ok(ok_message("vehicle profile deleted", Value::Null))
}

// ---- Combined vehicle record ---------------------------------------------

/// GET /api/vehicle/{key}: both halves of the record, fetched concurrently.
async fn get_vehicle_record(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let (profile, details) = tokio::join!(
        state.profiles.find_by_vehicle_key(&key),
        state.details.find_by_vehicle_key(&key),
    );
    let (profile, details) = (profile?, details?);
    if profile.is_none() && details.is_none() {
        return Err(AppError::not_found("not_found", "vehicle not found"));
    }

    let created_at = profile.as_ref().map(|p| p.created_at).or(details.as_ref().map(|d| d.created_at));
    let updated_at = profile.as_ref().map(|p| p.updated_at).or(details.as_ref().map(|d| d.updated_at));
    Ok(ok_data(json!({
        "vehicleKey": key,
        "basicInfo": profile,
        "detailedInfo": details,
        "createdAt": created_at,
        "updatedAt": updated_at,
    })))
}

/// Initial contents for a new extended record; all collections optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DetailsPayload {
    routes: Vec<RouteLeg>,
    drivers: Vec<Driver>,
    vehicle: VehicleInfo,
}

/// POST /api/vehicle/{key}: create the extended record for a vehicle key,
/// owned by the caller.
async fn create_vehicle_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(payload): Json<DetailsPayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let caller = require_session(&state, &headers)?;
    let mut details = ProfileDetails::new(&key, &caller.email);
    details.routes = payload.routes;
    details.drivers = payload.drivers;
    details.vehicle = payload.vehicle;

    let id = state.details.create(&details).await?;
    details.id = Some(id);
    Ok(created("vehicle details created", details))
}

/// DELETE /api/vehicle/{key}: the coordinated delete across both stores.
async fn delete_vehicle_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let caller = require_session(&state, &headers)?;

    // Ownership comes from whichever half exists; a non-owner learns nothing
    // beyond the 403.
    let owner = match state.profiles.find_by_vehicle_key(&key).await? {
        Some(profile) => Some(profile.owner_email),
        None => state.details.find_by_vehicle_key(&key).await?.map(|d| d.owner_email),
    };
    let Some(owner) = owner else {
        return Err(AppError::not_found("not_found", "vehicle not found"));
    };
    if owner != caller.email {
        return Err(AppError::forbidden("not_owner", "you can only delete your own vehicle"));
    }

    let (profile_gone, details_gone) = tokio::join!(
        state.profiles.delete_by_vehicle_key(&key),
        state.details.delete_by_vehicle_key(&key),
    );
    let _ = (profile_gone?, details_gone?);
    Ok(ok_message("vehicle deleted", Value::Null))
}

// ---- Partial update dispatch ---------------------------------------------

#[derive(Debug, Deserialize)]
struct DetailsUpdateRequest {
    id: String,
    #[serde(flatten)]
    action: DetailsAction,
}

/// PUT /api/vehicleDetails: `{id, action, payload}` dispatched into the
/// partial update engine. Unknown actions are rejected here, before any
/// store access.
async fn update_vehicle_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let caller = require_session(&state, &headers)?;

    let request: DetailsUpdateRequest = serde_json::from_value(body)
        .map_err(|e| AppError::user("invalid_action".into(), format!("invalid update request: {e}")))?;
    let id = ObjectId::parse_str(&request.id)
        .map_err(|_| AppError::user("invalid_id", "malformed document id"))?;

    match state.details.apply(id, &caller.email, &request.action).await? {
        Some(updated) => Ok(ok_data(updated)),
        None => Err(AppError::not_found("not_found", "vehicle details not found")),
    }
}

// ---- Caller's own record -------------------------------------------------

/// GET /api/details: the caller's profile, by session identity.
async fn my_details(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<(StatusCode, Json<Value>)> {
    let caller = require_session(&state, &headers)?;
    match state.profiles.find_by_identity(&caller.email).await? {
        Some(profile) => Ok(ok_data(profile)),
        None => Err(AppError::not_found("not_found", "no vehicle found for this identity")),
    }
}

// ---- Image upload --------------------------------------------------------

/// POST /api/upload: proxy an image to the configured host, returning the
/// hosted URL for use in sub-document payloads.
async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_session(&state, &headers)?;
    let Some(host) = &state.images else {
        return Err(AppError::upstream("image_host_missing", "image host not configured"));
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::user("invalid_upload".into(), format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::user("invalid_upload".into(), format!("unreadable image field: {e}")))?;
        let url = host.upload(bytes.to_vec(), &filename).await?;
        return Ok(ok_data(json!({ "url": url })));
    }
    Err(AppError::user("invalid_upload", "image field required"))
}

// ---- Navigational pages (gate targets; rendering is out of scope) --------

async fn home_page() -> Html<&'static str> {
    Html("<h1>sawari</h1><p>Registered vehicles and routes.</p>")
}

async fn form_page() -> Html<&'static str> {
    Html("<h1>Driver &amp; Vehicle Registration</h1>")
}

async fn auth_page() -> Html<&'static str> {
    Html("<h1>Sign in</h1>")
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
