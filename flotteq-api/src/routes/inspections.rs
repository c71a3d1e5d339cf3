/// Contrôle technique records of a vehicle
///
/// `next_due_date` drives the daily reminder sweep; changing it clears the
/// reminder stamp so the new date gets its own reminder.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    routes::{file_response, nullable, vehicles::load_vehicle},
    storage::{content_type_for_path, read_upload, FileCategory},
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use chrono::NaiveDate;
use flotteq_shared::{
    auth::middleware::AuthContext,
    models::inspection::{CreateInspection, InspectionResult, TechnicalInspection, UpdateInspection},
    policy::VehicleAction,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInspectionRequest {
    pub inspected_on: NaiveDate,
    pub next_due_date: NaiveDate,
    pub result: InspectionResult,

    #[validate(length(max = 255, message = "Center must be at most 255 characters"))]
    pub center: Option<String>,

    #[validate(range(min = 0, message = "Mileage cannot be negative"))]
    pub mileage: Option<i32>,

    #[validate(range(min = 0, message = "Cost cannot be negative"))]
    pub cost_cents: Option<i64>,

    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateInspectionRequest {
    pub inspected_on: Option<NaiveDate>,
    pub next_due_date: Option<NaiveDate>,
    pub result: Option<InspectionResult>,

    #[serde(default, deserialize_with = "nullable")]
    pub center: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable")]
    pub mileage: Option<Option<i32>>,

    #[serde(default, deserialize_with = "nullable")]
    pub cost_cents: Option<Option<i64>>,

    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

fn check_dates(inspected_on: NaiveDate, next_due_date: NaiveDate) -> ApiResult<()> {
    if next_due_date <= inspected_on {
        return Err(ApiError::invalid(
            "next_due_date",
            "Next due date must be after the inspection date",
        ));
    }
    Ok(())
}

fn not_found() -> ApiError {
    ApiError::NotFound("Inspection not found".to_string())
}

async fn find_inspection(
    state: &AppState,
    vehicle_id: Uuid,
    id: Uuid,
) -> ApiResult<TechnicalInspection> {
    TechnicalInspection::find_for_vehicle(&state.db, vehicle_id, id)
        .await?
        .ok_or_else(not_found)
}

pub async fn list_inspections(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(vehicle_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<TechnicalInspection>>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;
    Ok(Json(TechnicalInspection::list_for_vehicle(&state.db, vehicle.id).await?))
}

pub async fn create_inspection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(vehicle_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateInspectionRequest>,
) -> ApiResult<(StatusCode, Json<TechnicalInspection>)> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    req.validate()?;
    check_dates(req.inspected_on, req.next_due_date)?;

    let inspection = TechnicalInspection::create(
        &state.db,
        CreateInspection {
            vehicle_id: vehicle.id,
            tenant_id: vehicle.tenant_id,
            inspected_on: req.inspected_on,
            next_due_date: req.next_due_date,
            result: req.result,
            center: req.center,
            mileage: req.mileage,
            cost_cents: req.cost_cents,
            notes: req.notes,
        },
    )
    .await?;

    info!(
        vehicle_id = %vehicle.id,
        inspection_id = %inspection.id,
        next_due_date = %inspection.next_due_date,
        "Inspection recorded"
    );

    Ok((StatusCode::CREATED, Json(inspection)))
}

pub async fn get_inspection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, inspection_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<TechnicalInspection>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;
    Ok(Json(find_inspection(&state, vehicle.id, inspection_id).await?))
}

pub async fn update_inspection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, inspection_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<UpdateInspectionRequest>,
) -> ApiResult<Json<TechnicalInspection>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    let current = find_inspection(&state, vehicle.id, inspection_id).await?;

    check_dates(
        req.inspected_on.unwrap_or(current.inspected_on),
        req.next_due_date.unwrap_or(current.next_due_date),
    )?;

    if matches!(req.mileage, Some(Some(m)) if m < 0) {
        return Err(ApiError::invalid("mileage", "Mileage cannot be negative"));
    }
    if matches!(req.cost_cents, Some(Some(c)) if c < 0) {
        return Err(ApiError::invalid("cost_cents", "Cost cannot be negative"));
    }

    let inspection = TechnicalInspection::update(
        &state.db,
        vehicle.id,
        current.id,
        UpdateInspection {
            inspected_on: req.inspected_on,
            next_due_date: req.next_due_date,
            result: req.result,
            center: req.center,
            mileage: req.mileage,
            cost_cents: req.cost_cents,
            notes: req.notes,
        },
    )
    .await?
    .ok_or_else(not_found)?;

    Ok(Json(inspection))
}

pub async fn delete_inspection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, inspection_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    let inspection = find_inspection(&state, vehicle.id, inspection_id).await?;

    if !TechnicalInspection::delete(&state.db, vehicle.id, inspection.id).await? {
        return Err(not_found());
    }
    state.storage.remove_all(inspection.report_path).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Attaches (or replaces) the inspection report
pub async fn upload_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, inspection_id)): ApiPath<(Uuid, Uuid)>,
    mut multipart: Multipart,
) -> ApiResult<Json<TechnicalInspection>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    let previous = find_inspection(&state, vehicle.id, inspection_id).await?;

    let upload = read_upload(&mut multipart).await?;
    let stored = state.storage.save(FileCategory::InspectionReport, &upload.data).await?;

    let inspection = match TechnicalInspection::attach_report(
        &state.db,
        vehicle.id,
        previous.id,
        &stored.path,
        &upload.file_name,
    )
    .await
    {
        Ok(Some(inspection)) => inspection,
        Ok(None) => {
            state.storage.remove_all([&stored.path]).await;
            return Err(not_found());
        }
        Err(e) => {
            state.storage.remove_all([&stored.path]).await;
            return Err(e.into());
        }
    };

    state.storage.remove_all(previous.report_path).await;

    info!(inspection_id = %inspection.id, path = %stored.path, "Inspection report uploaded");
    Ok(Json(inspection))
}

pub async fn download_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, inspection_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Response> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;
    let inspection = find_inspection(&state, vehicle.id, inspection_id).await?;

    let path = inspection
        .report_path
        .as_deref()
        .ok_or_else(|| ApiError::NotFound("Inspection has no report".to_string()))?;

    let data = state.storage.read(path).await?;
    let name = inspection.report_name.as_deref().unwrap_or("controle-technique");

    Ok(file_response(data, content_type_for_path(path), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_due_date_must_follow_inspection() {
        assert!(check_dates(date(2024, 6, 1), date(2026, 6, 1)).is_ok());
        assert!(check_dates(date(2024, 6, 1), date(2024, 6, 1)).is_err());
        assert!(check_dates(date(2024, 6, 1), date(2023, 6, 1)).is_err());
    }

    #[test]
    fn test_create_request_parses_result() {
        let req: CreateInspectionRequest = serde_json::from_str(
            r#"{"inspected_on": "2024-06-01", "next_due_date": "2024-08-01", "result": "contre_visite"}"#,
        )
        .unwrap();

        assert_eq!(req.result, InspectionResult::ContreVisite);
        assert!(req.validate().is_ok());
    }
}
