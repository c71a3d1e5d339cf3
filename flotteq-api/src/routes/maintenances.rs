/// Maintenance records and replaced parts of a vehicle
///
/// Authorized through the parent vehicle: reads need `View`, writes `Update`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    routes::{nullable, vehicles::load_vehicle},
};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use flotteq_shared::{
    auth::middleware::AuthContext,
    models::maintenance::{
        CreateMaintenance, CreateReplacedPart, Maintenance, MaintenanceKind, MaintenanceStatus,
        ReplacedPart, UpdateMaintenance,
    },
    policy::VehicleAction,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaintenanceRequest {
    pub kind: MaintenanceKind,

    /// Defaults to `completed`
    pub status: Option<MaintenanceStatus>,

    pub performed_on: NaiveDate,

    #[validate(range(min = 0, message = "Mileage cannot be negative"))]
    pub mileage: Option<i32>,

    #[validate(length(max = 255, message = "Garage must be at most 255 characters"))]
    pub garage: Option<String>,

    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,

    #[serde(default)]
    #[validate(range(min = 0, message = "Cost cannot be negative"))]
    pub cost_cents: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMaintenanceRequest {
    pub kind: Option<MaintenanceKind>,
    pub status: Option<MaintenanceStatus>,
    pub performed_on: Option<NaiveDate>,

    #[serde(default, deserialize_with = "nullable")]
    pub mileage: Option<Option<i32>>,

    #[serde(default, deserialize_with = "nullable")]
    pub garage: Option<Option<String>>,

    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = 0, message = "Cost cannot be negative"))]
    pub cost_cents: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePartRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(max = 100, message = "Reference must be at most 100 characters"))]
    pub reference: Option<String>,

    #[serde(default = "one")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    #[serde(default)]
    #[validate(range(min = 0, message = "Unit price cannot be negative"))]
    pub unit_price_cents: i64,
}

fn one() -> i32 {
    1
}

/// A maintenance with its replaced parts
#[derive(Debug, Serialize)]
pub struct MaintenanceDetail {
    #[serde(flatten)]
    pub maintenance: Maintenance,
    pub parts: Vec<ReplacedPart>,
    pub parts_total_cents: i64,
}

impl MaintenanceDetail {
    fn new(maintenance: Maintenance, parts: Vec<ReplacedPart>) -> Self {
        let parts_total_cents = parts.iter().map(ReplacedPart::total_cents).sum();
        Self {
            maintenance,
            parts,
            parts_total_cents,
        }
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Maintenance not found".to_string())
}

async fn find_maintenance(state: &AppState, vehicle_id: Uuid, id: Uuid) -> ApiResult<Maintenance> {
    Maintenance::find_for_vehicle(&state.db, vehicle_id, id)
        .await?
        .ok_or_else(not_found)
}

pub async fn list_maintenances(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(vehicle_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Maintenance>>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;
    Ok(Json(Maintenance::list_for_vehicle(&state.db, vehicle.id).await?))
}

pub async fn create_maintenance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(vehicle_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateMaintenanceRequest>,
) -> ApiResult<(StatusCode, Json<Maintenance>)> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    req.validate()?;

    let maintenance = Maintenance::create(
        &state.db,
        CreateMaintenance {
            vehicle_id: vehicle.id,
            tenant_id: vehicle.tenant_id,
            kind: req.kind,
            status: req.status.unwrap_or(MaintenanceStatus::Completed),
            performed_on: req.performed_on,
            mileage: req.mileage,
            garage: req.garage,
            description: req.description,
            cost_cents: req.cost_cents,
        },
    )
    .await?;

    tracing::debug!(vehicle_id = %vehicle.id, maintenance_id = %maintenance.id, "Maintenance recorded");
    Ok((StatusCode::CREATED, Json(maintenance)))
}

pub async fn get_maintenance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, maintenance_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<MaintenanceDetail>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;
    let maintenance = find_maintenance(&state, vehicle.id, maintenance_id).await?;
    let parts = ReplacedPart::list_for_maintenance(&state.db, maintenance.id).await?;

    Ok(Json(MaintenanceDetail::new(maintenance, parts)))
}

pub async fn update_maintenance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, maintenance_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<UpdateMaintenanceRequest>,
) -> ApiResult<Json<Maintenance>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    req.validate()?;

    if let Some(Some(mileage)) = req.mileage {
        if mileage < 0 {
            return Err(ApiError::invalid("mileage", "Mileage cannot be negative"));
        }
    }

    let maintenance = Maintenance::update(
        &state.db,
        vehicle.id,
        maintenance_id,
        UpdateMaintenance {
            kind: req.kind,
            status: req.status,
            performed_on: req.performed_on,
            mileage: req.mileage,
            garage: req.garage,
            description: req.description,
            cost_cents: req.cost_cents,
        },
    )
    .await?
    .ok_or_else(not_found)?;

    Ok(Json(maintenance))
}

pub async fn delete_maintenance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, maintenance_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;

    if !Maintenance::delete(&state.db, vehicle.id, maintenance_id).await? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_part(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, maintenance_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<CreatePartRequest>,
) -> ApiResult<(StatusCode, Json<ReplacedPart>)> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    req.validate()?;
    let maintenance = find_maintenance(&state, vehicle.id, maintenance_id).await?;

    let part = ReplacedPart::create(
        &state.db,
        CreateReplacedPart {
            maintenance_id: maintenance.id,
            name: req.name,
            reference: req.reference,
            quantity: req.quantity,
            unit_price_cents: req.unit_price_cents,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(part)))
}

pub async fn delete_part(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, maintenance_id, part_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    let maintenance = find_maintenance(&state, vehicle.id, maintenance_id).await?;

    if !ReplacedPart::delete(&state.db, maintenance.id, part_id).await? {
        return Err(ApiError::NotFound("Part not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn part(quantity: i32, unit_price_cents: i64) -> ReplacedPart {
        ReplacedPart {
            id: Uuid::new_v4(),
            maintenance_id: Uuid::new_v4(),
            name: "Plaquettes de frein".to_string(),
            reference: None,
            quantity,
            unit_price_cents,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_detail_sums_parts() {
        let maintenance = Maintenance {
            id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            kind: MaintenanceKind::Repair,
            status: MaintenanceStatus::Completed,
            performed_on: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            mileage: Some(84_000),
            garage: None,
            description: "Freins avant".to_string(),
            cost_cents: 32_000,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let detail = MaintenanceDetail::new(maintenance, vec![part(2, 4_500), part(1, 1_200)]);
        assert_eq!(detail.parts_total_cents, 10_200);

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["description"], "Freins avant");
        assert_eq!(json["parts"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_part_request_defaults() {
        let req: CreatePartRequest = serde_json::from_str(r#"{"name": "Filtre à huile"}"#).unwrap();
        assert_eq!(req.quantity, 1);
        assert_eq!(req.unit_price_cents, 0);
        assert!(req.validate().is_ok());

        let req: CreatePartRequest =
            serde_json::from_str(r#"{"name": "Filtre", "quantity": 0}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
