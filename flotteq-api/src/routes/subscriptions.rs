/// Plans and the caller's own enrollment
///
/// Enrollment is direct: picking a plan activates it at once for one billing
/// period and retires the previous enrollment in the same transaction.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use flotteq_shared::{
    auth::{
        authorization::{require_permission, require_tenant, Permission},
        middleware::AuthContext,
    },
    models::subscription::{CurrentSubscription, Subscription, UserSubscription},
    quota::{QuotaEnforcer, QuotaUsage},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub subscription_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CurrentResponse {
    /// None while on the free allowance
    pub subscription: Option<CurrentSubscription>,
}

pub async fn list_plans(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Subscription>>> {
    Ok(Json(Subscription::list_active(&state.db).await?))
}

pub async fn current(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<CurrentResponse>> {
    require_tenant(&auth)?;

    let subscription = UserSubscription::find_current(&state.db, auth.user_id, Utc::now()).await?;
    Ok(Json(CurrentResponse { subscription }))
}

/// Enrolls the caller in a plan, replacing any active enrollment
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<UserSubscription>)> {
    require_tenant(&auth)?;
    require_permission(&auth, Permission::ManageSubscription)?;

    let plan = Subscription::find_by_id(&state.db, req.subscription_id)
        .await?
        .filter(|plan| plan.is_active)
        .ok_or_else(|| ApiError::NotFound("Plan not found".to_string()))?;

    let enrollment = UserSubscription::subscribe(&state.db, auth.user_id, &plan).await?;

    info!(
        user_id = %auth.user_id,
        plan = %plan.name,
        end_date = %enrollment.end_date,
        "User subscribed"
    );

    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<UserSubscription>> {
    require_tenant(&auth)?;
    require_permission(&auth, Permission::ManageSubscription)?;

    let cancelled = UserSubscription::cancel(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active subscription".to_string()))?;

    info!(user_id = %auth.user_id, enrollment_id = %cancelled.id, "Subscription cancelled");
    Ok(Json(cancelled))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<UserSubscription>>> {
    require_tenant(&auth)?;
    Ok(Json(UserSubscription::list_for_user(&state.db, auth.user_id).await?))
}

/// Vehicle quota usage of the caller
pub async fn usage(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<QuotaUsage>> {
    require_tenant(&auth)?;

    let usage = QuotaEnforcer::new(state.db.clone()).usage(auth.user_id).await?;
    Ok(Json(usage))
}
