/// Invoices of a vehicle and their scanned documents
///
/// The document is a multipart upload (field `file`, PDF or image) stored
/// under `invoices/`. Uploading again replaces the previous file.

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
    models::{
        invoice::{CreateInvoice, Invoice, InvoiceCategory, UpdateInvoice},
        maintenance::Maintenance,
    },
    policy::VehicleAction,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub maintenance_id: Option<Uuid>,

    #[validate(length(max = 100, message = "Number must be at most 100 characters"))]
    pub number: Option<String>,

    #[validate(length(max = 255, message = "Supplier must be at most 255 characters"))]
    pub supplier: Option<String>,

    pub category: InvoiceCategory,

    pub issued_on: NaiveDate,

    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount_cents: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub maintenance_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "nullable")]
    pub number: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable")]
    pub supplier: Option<Option<String>>,

    pub category: Option<InvoiceCategory>,
    pub issued_on: Option<NaiveDate>,

    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount_cents: Option<i64>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Invoice not found".to_string())
}

/// The linked maintenance must belong to the same vehicle
async fn check_maintenance(state: &AppState, vehicle_id: Uuid, maintenance_id: Uuid) -> ApiResult<()> {
    Maintenance::find_for_vehicle(&state.db, vehicle_id, maintenance_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::invalid("maintenance_id", "Unknown maintenance for this vehicle"))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(vehicle_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;
    Ok(Json(Invoice::list_for_vehicle(&state.db, vehicle.id).await?))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(vehicle_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CreateInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    req.validate()?;

    if let Some(maintenance_id) = req.maintenance_id {
        check_maintenance(&state, vehicle.id, maintenance_id).await?;
    }

    let invoice = Invoice::create(
        &state.db,
        CreateInvoice {
            vehicle_id: vehicle.id,
            tenant_id: vehicle.tenant_id,
            maintenance_id: req.maintenance_id,
            number: req.number,
            supplier: req.supplier,
            category: req.category,
            issued_on: req.issued_on,
            amount_cents: req.amount_cents,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, invoice_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<Invoice>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;

    let invoice = Invoice::find_for_vehicle(&state.db, vehicle.id, invoice_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(invoice))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, invoice_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<UpdateInvoiceRequest>,
) -> ApiResult<Json<Invoice>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;
    req.validate()?;

    if let Some(Some(maintenance_id)) = req.maintenance_id {
        check_maintenance(&state, vehicle.id, maintenance_id).await?;
    }

    let invoice = Invoice::update(
        &state.db,
        vehicle.id,
        invoice_id,
        UpdateInvoice {
            maintenance_id: req.maintenance_id,
            number: req.number,
            supplier: req.supplier,
            category: req.category,
            issued_on: req.issued_on,
            amount_cents: req.amount_cents,
        },
    )
    .await?
    .ok_or_else(not_found)?;

    Ok(Json(invoice))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, invoice_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;

    let invoice = Invoice::find_for_vehicle(&state.db, vehicle.id, invoice_id)
        .await?
        .ok_or_else(not_found)?;

    if !Invoice::delete(&state.db, vehicle.id, invoice.id).await? {
        return Err(not_found());
    }
    state.storage.remove_all(invoice.document_path).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Attaches (or replaces) the scanned document of an invoice
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, invoice_id)): ApiPath<(Uuid, Uuid)>,
    mut multipart: Multipart,
) -> ApiResult<Json<Invoice>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;

    let previous = Invoice::find_for_vehicle(&state.db, vehicle.id, invoice_id)
        .await?
        .ok_or_else(not_found)?;

    let upload = read_upload(&mut multipart).await?;
    let stored = state.storage.save(FileCategory::InvoiceDocument, &upload.data).await?;

    let attached =
        Invoice::attach_document(&state.db, vehicle.id, previous.id, &stored.path, &upload.file_name)
            .await;

    let invoice = match attached {
        Ok(Some(invoice)) => invoice,
        Ok(None) => {
            state.storage.remove_all([&stored.path]).await;
            return Err(not_found());
        }
        Err(e) => {
            state.storage.remove_all([&stored.path]).await;
            return Err(e.into());
        }
    };

    state.storage.remove_all(previous.document_path).await;

    info!(invoice_id = %invoice.id, path = %stored.path, size = stored.size, "Invoice document uploaded");
    Ok(Json(invoice))
}

pub async fn download_document(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, invoice_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Response> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;

    let invoice = Invoice::find_for_vehicle(&state.db, vehicle.id, invoice_id)
        .await?
        .ok_or_else(not_found)?;

    let path = invoice
        .document_path
        .as_deref()
        .ok_or_else(|| ApiError::NotFound("Invoice has no document".to_string()))?;

    let data = state.storage.read(path).await?;
    let name = invoice.document_name.as_deref().unwrap_or("facture");

    Ok(file_response(data, content_type_for_path(path), name))
}
