/// Vehicle endpoints
///
/// ```text
/// GET    /api/vehicles          caller's own vehicles
/// POST   /api/vehicles          create (quota gate)
/// GET    /api/vehicles/:id
/// PUT    /api/vehicles/:id
/// DELETE /api/vehicles/:id      vehicle, its records and stored files
/// ```
///
/// Every route except the listing goes through [`load_vehicle`], which runs
/// the vehicle policy. Creation runs the quota gate inside one transaction.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    routes::nullable,
};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use flotteq_shared::{
    auth::{
        authorization::{require_permission, require_tenant, Permission},
        middleware::AuthContext,
    },
    models::vehicle::{CreateVehicle, FuelType, UpdateVehicle, Vehicle, VehicleStatus},
    policy::{PolicyDenial, VehicleAction, VehiclePolicy},
    quota::create_vehicle_within_quota,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Loads a vehicle and authorizes `action` on it
///
/// A missing vehicle and a vehicle of another tenant both answer 404.
pub(crate) async fn load_vehicle(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    action: VehicleAction,
) -> ApiResult<Vehicle> {
    let vehicle = Vehicle::find_by_id(&state.db, id)
        .await?
        .ok_or(PolicyDenial::NotFound)?;

    VehiclePolicy::authorize(auth, &vehicle, action)?;
    Ok(vehicle)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 1, max = 20, message = "Plate must be 1-20 characters"))]
    pub plate: String,

    #[validate(length(min = 11, max = 17, message = "VIN must be 11-17 characters"))]
    pub vin: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Brand must be 1-100 characters"))]
    pub brand: String,

    #[validate(length(min = 1, max = 100, message = "Model must be 1-100 characters"))]
    pub model: String,

    #[validate(range(min = 1900, max = 2100, message = "Year must be between 1900 and 2100"))]
    pub year: Option<i32>,

    pub fuel_type: FuelType,

    #[serde(default)]
    #[validate(range(min = 0, message = "Mileage cannot be negative"))]
    pub mileage: i32,

    #[validate(length(max = 50, message = "Color must be at most 50 characters"))]
    pub color: Option<String>,

    pub purchase_date: Option<NaiveDate>,

    #[validate(range(min = 0, message = "Purchase price cannot be negative"))]
    pub purchase_price_cents: Option<i64>,

    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(length(min = 1, max = 20, message = "Plate must be 1-20 characters"))]
    pub plate: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub vin: Option<Option<String>>,

    #[validate(length(min = 1, max = 100, message = "Brand must be 1-100 characters"))]
    pub brand: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Model must be 1-100 characters"))]
    pub model: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub year: Option<Option<i32>>,

    pub fuel_type: Option<FuelType>,

    #[validate(range(min = 0, message = "Mileage cannot be negative"))]
    pub mileage: Option<i32>,

    #[serde(default, deserialize_with = "nullable")]
    pub color: Option<Option<String>>,

    pub status: Option<VehicleStatus>,

    #[serde(default, deserialize_with = "nullable")]
    pub purchase_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "nullable")]
    pub purchase_price_cents: Option<Option<i64>>,

    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

impl UpdateVehicleRequest {
    /// Checks the nullable fields the derive can't reach
    fn check_nullable(&self) -> ApiResult<()> {
        if let Some(Some(year)) = self.year {
            if !(1900..=2100).contains(&year) {
                return Err(ApiError::invalid("year", "Year must be between 1900 and 2100"));
            }
        }
        if let Some(Some(vin)) = &self.vin {
            if !(11..=17).contains(&vin.len()) {
                return Err(ApiError::invalid("vin", "VIN must be 11-17 characters"));
            }
        }
        if let Some(Some(price)) = self.purchase_price_cents {
            if price < 0 {
                return Err(ApiError::invalid(
                    "purchase_price_cents",
                    "Purchase price cannot be negative",
                ));
            }
        }
        Ok(())
    }
}

/// Lists the caller's vehicles
pub async fn list_vehicles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Vehicle>>> {
    let tenant_id = require_tenant(&auth)?;
    require_permission(&auth, Permission::ViewVehicles)?;

    let vehicles = Vehicle::list_by_owner(&state.db, tenant_id, auth.user_id).await?;
    Ok(Json(vehicles))
}

/// Creates a vehicle owned by the caller
///
/// Returns 403 `quota_exceeded` once the free allowance or the plan limit is
/// used up, 409 on a plate already registered in the tenant.
pub async fn create_vehicle(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateVehicleRequest>,
) -> ApiResult<(StatusCode, Json<Vehicle>)> {
    VehiclePolicy::authorize_create(&auth)?;
    let tenant_id = require_tenant(&auth)?;
    req.validate()?;

    let vehicle = create_vehicle_within_quota(
        &state.db,
        CreateVehicle {
            tenant_id,
            user_id: auth.user_id,
            plate: req.plate,
            vin: req.vin,
            brand: req.brand,
            model: req.model,
            year: req.year,
            fuel_type: req.fuel_type,
            mileage: req.mileage,
            color: req.color,
            purchase_date: req.purchase_date,
            purchase_price_cents: req.purchase_price_cents,
            notes: req.notes,
        },
    )
    .await?;

    info!(
        tenant_id = %tenant_id,
        user_id = %auth.user_id,
        vehicle_id = %vehicle.id,
        plate = %vehicle.plate,
        "Vehicle created"
    );

    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn get_vehicle(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vehicle>> {
    let vehicle = load_vehicle(&state, &auth, id, VehicleAction::View).await?;
    Ok(Json(vehicle))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateVehicleRequest>,
) -> ApiResult<Json<Vehicle>> {
    let vehicle = load_vehicle(&state, &auth, id, VehicleAction::Update).await?;
    req.validate()?;
    req.check_nullable()?;

    let updated = Vehicle::update(
        &state.db,
        vehicle.id,
        UpdateVehicle {
            plate: req.plate,
            vin: req.vin,
            brand: req.brand,
            model: req.model,
            year: req.year,
            fuel_type: req.fuel_type,
            mileage: req.mileage,
            color: req.color,
            status: req.status,
            purchase_date: req.purchase_date,
            purchase_price_cents: req.purchase_price_cents,
            notes: req.notes,
        },
    )
    .await?
    .ok_or(PolicyDenial::NotFound)?;

    Ok(Json(updated))
}

/// Deletes a vehicle; records cascade, stored files are removed afterwards
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let vehicle = load_vehicle(&state, &auth, id, VehicleAction::Delete).await?;

    let files = Vehicle::stored_files(&state.db, vehicle.id).await?;
    if !Vehicle::delete(&state.db, vehicle.id).await? {
        return Err(PolicyDenial::NotFound.into());
    }
    state.storage.remove_all(files).await;

    info!(vehicle_id = %vehicle.id, user_id = %auth.user_id, "Vehicle deleted");
    Ok(StatusCode::NO_CONTENT)
}
