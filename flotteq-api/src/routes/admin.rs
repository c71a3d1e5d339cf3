/// Back-office endpoints for internal staff
///
/// ```text
/// GET/POST          /api/admin/tenants          manage tenants
/// GET/PUT/DELETE    /api/admin/tenants/:id      manage tenants
/// GET/POST          /api/admin/plans            manage plans
/// PUT               /api/admin/plans/:id        manage plans
/// GET               /api/admin/analytics/*      view analytics
/// ```
///
/// Tenant members are refused with 403 whatever their permissions.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::{nullable, Pagination},
};
use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use flotteq_shared::{
    analytics::{self, PlatformOverview, RevenueReport},
    auth::{
        authorization::{require_internal, Permission},
        middleware::AuthContext,
    },
    models::{
        subscription::{BillingInterval, CreateSubscription, Subscription, UpdateSubscription},
        tenant::{CreateTenant, Tenant, TenantSummary, UpdateTenant},
    },
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub contact_email: Option<String>,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,

    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTenantRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub contact_email: Option<String>,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,

    pub address: Option<String>,
    pub is_active: Option<bool>,
    pub settings: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct TenantListResponse {
    pub tenants: Vec<TenantSummary>,
    pub total: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_cents: i64,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be an ISO 4217 code"))]
    pub currency: String,

    pub billing_interval: BillingInterval,

    #[validate(range(min = 1, message = "A plan must allow at least one vehicle"))]
    pub max_vehicles: i32,
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_cents: Option<i64>,

    #[validate(range(min = 1, message = "A plan must allow at least one vehicle"))]
    pub max_vehicles: Option<i32>,

    pub is_active: Option<bool>,
}

fn tenant_not_found() -> ApiError {
    ApiError::NotFound("Tenant not found".to_string())
}

pub async fn list_tenants(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<TenantListResponse>> {
    require_internal(&auth, Permission::ManageTenants)?;

    let tenants = Tenant::list_summaries(&state.db, page.limit(), page.offset()).await?;
    let total = Tenant::count(&state.db).await?;

    Ok(Json(TenantListResponse { tenants, total }))
}

pub async fn create_tenant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<Tenant>)> {
    require_internal(&auth, Permission::ManageTenants)?;
    req.validate()?;

    let tenant = Tenant::create(
        &state.db,
        CreateTenant {
            name: req.name,
            contact_email: req.contact_email,
            phone: req.phone,
            address: req.address,
        },
    )
    .await?;

    info!(tenant_id = %tenant.id, created_by = %auth.user_id, "Tenant created from back office");
    Ok((StatusCode::CREATED, Json(tenant)))
}

pub async fn get_tenant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Tenant>> {
    require_internal(&auth, Permission::ManageTenants)?;

    let tenant = Tenant::find_by_id(&state.db, id)
        .await?
        .ok_or_else(tenant_not_found)?;

    Ok(Json(tenant))
}

pub async fn update_tenant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTenantRequest>,
) -> ApiResult<Json<Tenant>> {
    require_internal(&auth, Permission::ManageTenants)?;
    req.validate()?;

    let tenant = Tenant::update(
        &state.db,
        id,
        UpdateTenant {
            name: req.name,
            contact_email: req.contact_email,
            phone: req.phone,
            address: req.address,
            is_active: req.is_active,
            settings: req.settings,
        },
    )
    .await?
    .ok_or_else(tenant_not_found)?;

    if tenant.is_active {
        info!(tenant_id = %tenant.id, "Tenant updated");
    } else {
        warn!(tenant_id = %tenant.id, updated_by = %auth.user_id, "Tenant deactivated");
    }

    Ok(Json(tenant))
}

/// Deletes a tenant with all of its users, vehicles and files
pub async fn delete_tenant(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    require_internal(&auth, Permission::ManageTenants)?;

    let files = Tenant::stored_files(&state.db, id).await?;
    if !Tenant::delete(&state.db, id).await? {
        return Err(tenant_not_found());
    }
    state.storage.remove_all(files).await;

    warn!(tenant_id = %id, deleted_by = %auth.user_id, "Tenant deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// All plans, including retired ones
pub async fn list_plans(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Subscription>>> {
    require_internal(&auth, Permission::ManagePlans)?;
    Ok(Json(Subscription::list_all(&state.db).await?))
}

pub async fn create_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreatePlanRequest>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    require_internal(&auth, Permission::ManagePlans)?;
    req.validate()?;

    let plan = Subscription::create(
        &state.db,
        CreateSubscription {
            name: req.name,
            description: req.description,
            price_cents: req.price_cents,
            currency: req.currency.to_uppercase(),
            billing_interval: req.billing_interval,
            max_vehicles: req.max_vehicles,
        },
    )
    .await?;

    info!(plan_id = %plan.id, name = %plan.name, max_vehicles = plan.max_vehicles, "Plan created");
    Ok((StatusCode::CREATED, Json(plan)))
}

/// Edits a plan; retiring it (`is_active: false`) keeps existing enrollments
pub async fn update_plan(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdatePlanRequest>,
) -> ApiResult<Json<Subscription>> {
    require_internal(&auth, Permission::ManagePlans)?;
    req.validate()?;

    let plan = Subscription::update(
        &state.db,
        id,
        UpdateSubscription {
            name: req.name,
            description: req.description,
            price_cents: req.price_cents,
            max_vehicles: req.max_vehicles,
            is_active: req.is_active,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Plan not found".to_string()))?;

    Ok(Json(plan))
}

pub async fn analytics_overview(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<PlatformOverview>> {
    require_internal(&auth, Permission::ViewAnalytics)?;
    Ok(Json(analytics::overview(&state.db, Utc::now()).await?))
}

pub async fn analytics_revenue(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<RevenueReport>> {
    require_internal(&auth, Permission::ViewAnalytics)?;
    Ok(Json(analytics::revenue_report(&state.db, Utc::now()).await?))
}

pub async fn analytics_tenants(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<Vec<TenantSummary>>> {
    require_internal(&auth, Permission::ViewAnalytics)?;
    Ok(Json(analytics::tenant_breakdown(&state.db, page.limit(), page.offset()).await?))
}
