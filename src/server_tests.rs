use super::*;
use crate::store::memory::{MemoryDetailsStore, MemoryProfileStore};
use crate::store::model::ProfileStatus;

struct FixedResolver(Option<Principal>);

impl SessionResolver for FixedResolver {
    fn resolve(&self, _headers: &HeaderMap) -> Option<Principal> {
        self.0.clone()
    }
}

struct TestHarness {
    state: AppState,
    profiles: Arc<MemoryProfileStore>,
    details: Arc<MemoryDetailsStore>,
}

fn harness(principal: Option<Principal>) -> TestHarness {
    let profiles = Arc::new(MemoryProfileStore::default());
    let details = Arc::new(MemoryDetailsStore::default());
    let state = AppState {
        profiles: profiles.clone(),
        details: details.clone(),
        resolver: Arc::new(FixedResolver(principal)),
        images: None,
        gate: Arc::new(GatePolicy::new(true)),
    };
    TestHarness { state, profiles, details }
}

fn ram() -> Principal {
    Principal::new("ram@gmail.com", Some("Ram Thapa"))
}

fn registration(number: &str) -> RegistrationFields {
    RegistrationFields {
        full_name: "Ram Thapa".into(),
        driving_license: "DL-0192".into(),
        road_permit: "RP-2081".into(),
        national_id: "NID-4455".into(),
        gender: "Male".into(),
        contact_number: "9841000000".into(),
        vehicle_number: number.into(),
    }
}

#[tokio::test]
async fn upsert_creates_disabled_then_updates_enabled() {
    let h = harness(Some(ram()));

    let (status, Json(body)) =
        upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(registration("BA 2 PA 4567")))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "disabled");
    assert_eq!(body["data"]["vehicleKey"], "ba-2-pa-4567");

    let (status, Json(body)) =
        upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(registration("BA 2 PA 4567")))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "enabled");

    // Exactly one document for the identity after both submissions
    let rows = h.profiles.list(None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ProfileStatus::Enabled);
}

#[tokio::test]
async fn upsert_rejects_blank_required_fields() {
    let h = harness(Some(ram()));
    let mut fields = registration("BA 2 PA 4567");
    fields.road_permit = "  ".into();
    let err = upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(fields))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserInput { .. }));
    assert!(h.profiles.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn upsert_requires_a_session() {
    let h = harness(None);
    let err = upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(registration("BA 2 PA 4567")))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 401);
}

#[tokio::test]
async fn profile_update_by_non_owner_is_forbidden_and_untouched() {
    let h = harness(Some(ram()));
    let sita = Profile::new("sita@gmail.com", "sita", registration("GA 1 KHA 99"));
    h.profiles.insert(&sita).await.unwrap();

    let update = ProfileUpdate { full_name: Some("Hijacked".into()), ..Default::default() };
    let err = update_profile(
        State(h.state.clone()),
        HeaderMap::new(),
        Path("ga-1-kha-99".to_string()),
        Json(update),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));

    let stored = h.profiles.find_by_identity("sita@gmail.com").await.unwrap().unwrap();
    assert_eq!(stored.full_name, "Ram Thapa");
}

#[tokio::test]
async fn profile_update_resyncs_vehicle_key() {
    let h = harness(Some(ram()));
    upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(registration("BA 2 PA 4567")))
        .await
        .unwrap();

    let update = ProfileUpdate { vehicle_number: Some("BA 9 PA 1111".into()), ..Default::default() };
    let (status, Json(body)) = update_profile(
        State(h.state.clone()),
        HeaderMap::new(),
        Path("ba-2-pa-4567".to_string()),
        Json(update),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["vehicleKey"], "ba-9-pa-1111");
}

#[tokio::test]
async fn profile_update_with_no_fields_is_rejected() {
    let h = harness(Some(ram()));
    let err = update_profile(
        State(h.state.clone()),
        HeaderMap::new(),
        Path("ba-2-pa-4567".to_string()),
        Json(ProfileUpdate::default()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::UserInput { .. }));
}

async fn created_details_id(h: &TestHarness, key: &str) -> String {
    let (status, Json(body)) = create_vehicle_details(
        State(h.state.clone()),
        HeaderMap::new(),
        Path(key.to_string()),
        Json(DetailsPayload::default()),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["_id"]["$oid"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn details_dispatch_add_and_remove_driver() {
    let h = harness(Some(ram()));
    let id = created_details_id(&h, "ba-2-pa-4567").await;

    let body = json!({
        "id": id,
        "action": "addDriver",
        "payload": { "driverObject": { "name": "Gopal", "age": 41, "gender": "Male", "contactNumber": "9810000000" } }
    });
    let (status, Json(body)) =
        update_vehicle_details(State(h.state.clone()), HeaderMap::new(), Json(body)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let driver_id = body["data"]["drivers"][0]["_id"].as_str().unwrap().to_string();

    let body = json!({ "id": id, "action": "removeDriver", "payload": { "driverId": driver_id } });
    let (_, Json(body)) =
        update_vehicle_details(State(h.state.clone()), HeaderMap::new(), Json(body)).await.unwrap();
    assert!(body["data"]["drivers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn details_dispatch_rejects_unknown_action() {
    let h = harness(Some(ram()));
    let id = created_details_id(&h, "ba-2-pa-4567").await;

    let body = json!({ "id": id, "action": "dropEverything", "payload": {} });
    let err = update_vehicle_details(State(h.state.clone()), HeaderMap::new(), Json(body))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserInput { ref code, .. } if code == "invalid_action"));
}

#[tokio::test]
async fn details_dispatch_rejects_malformed_id() {
    let h = harness(Some(ram()));
    let body = json!({ "id": "not-an-objectid", "action": "removeDriver", "payload": { "driverId": "d1" } });
    let err = update_vehicle_details(State(h.state.clone()), HeaderMap::new(), Json(body))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserInput { ref code, .. } if code == "invalid_id"));
}

#[tokio::test]
async fn details_dispatch_hides_unowned_documents() {
    let h = harness(Some(ram()));
    // Owned by somebody else
    let other = ProfileDetails::new("ga-1-kha-99", "sita@gmail.com");
    let id = h.details.create(&other).await.unwrap();

    let body = json!({ "id": id.to_hex(), "action": "addVehicleImage", "payload": { "url": "https://i.ibb.co/x.jpg" } });
    let err = update_vehicle_details(State(h.state.clone()), HeaderMap::new(), Json(body))
        .await
        .unwrap_err();
    // Indistinguishable from a missing document
    assert!(matches!(err, AppError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_details_key_conflicts() {
    let h = harness(Some(ram()));
    created_details_id(&h, "ba-2-pa-4567").await;
    let err = create_vehicle_details(
        State(h.state.clone()),
        HeaderMap::new(),
        Path("ba-2-pa-4567".to_string()),
        Json(DetailsPayload::default()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn my_details_reports_not_found_then_found() {
    let h = harness(Some(ram()));
    let err = my_details(State(h.state.clone()), HeaderMap::new()).await.unwrap_err();
    assert_eq!(err.http_status(), 404);

    upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(registration("BA 2 PA 4567")))
        .await
        .unwrap();
    let (status, Json(body)) = my_details(State(h.state.clone()), HeaderMap::new()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ownerEmail"], "ram@gmail.com");
}

#[tokio::test]
async fn combined_record_returns_whichever_halves_exist() {
    let h = harness(Some(ram()));
    upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(registration("BA 2 PA 4567")))
        .await
        .unwrap();

    let (_, Json(body)) =
        get_vehicle_record(State(h.state.clone()), Path("ba-2-pa-4567".to_string())).await.unwrap();
    assert!(!body["data"]["basicInfo"].is_null());
    assert!(body["data"]["detailedInfo"].is_null());

    created_details_id(&h, "ba-2-pa-4567").await;
    let (_, Json(body)) =
        get_vehicle_record(State(h.state.clone()), Path("ba-2-pa-4567".to_string())).await.unwrap();
    assert!(!body["data"]["detailedInfo"].is_null());

    let err = get_vehicle_record(State(h.state.clone()), Path("no-such-key".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn combined_delete_is_owner_only_and_coordinated() {
    let h = harness(Some(ram()));
    upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(registration("BA 2 PA 4567")))
        .await
        .unwrap();
    created_details_id(&h, "ba-2-pa-4567").await;

    // A different caller cannot delete
    let intruder = harness(Some(Principal::new("sita@gmail.com", None)));
    let intruder_state = AppState {
        profiles: h.profiles.clone(),
        details: h.details.clone(),
        ..intruder.state
    };
    let err = delete_vehicle_record(State(intruder_state), HeaderMap::new(), Path("ba-2-pa-4567".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));

    let (status, _) =
        delete_vehicle_record(State(h.state.clone()), HeaderMap::new(), Path("ba-2-pa-4567".to_string()))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(h.profiles.find_by_vehicle_key("ba-2-pa-4567").await.unwrap().is_none());
    assert!(h.details.find_by_vehicle_key("ba-2-pa-4567").await.unwrap().is_none());
}

#[tokio::test]
async fn list_vehicles_filters_by_identity() {
    let h = harness(Some(ram()));
    upsert_vehicle(State(h.state.clone()), HeaderMap::new(), Json(registration("BA 2 PA 4567")))
        .await
        .unwrap();
    let sita = Profile::new("sita@gmail.com", "sita", registration("GA 1 KHA 99"));
    h.profiles.insert(&sita).await.unwrap();

    let (_, Json(body)) =
        list_vehicles(State(h.state.clone()), Query(ListQuery { gmail: Some("Ram@Gmail.com".into()) }))
            .await
            .unwrap();
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ownerEmail"], "ram@gmail.com");

    let (_, Json(body)) =
        list_vehicles(State(h.state.clone()), Query(ListQuery { gmail: None })).await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}
