/// Tenant user management
///
/// Every route is scoped to the caller's tenant: a user id from another
/// tenant answers 404. Reads need `view users`, writes `manage users`.
/// Internal staff have no tenant and are refused here.

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
use flotteq_shared::{
    auth::{
        authorization::{require_permission, require_tenant, Permission},
        middleware::AuthContext,
        password,
    },
    models::{
        role::{Role, DEFAULT_MEMBER_ROLE},
        user::{CreateUser, UpdateUser, User},
        vehicle::Vehicle,
    },
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Optional; a user without password can only sign in with Google
    pub password: Option<String>,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,

    /// Role names, defaults to the member role
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub password: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub first_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable")]
    pub last_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,

    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub roles: Vec<String>,
}

/// A user with the names of their roles
#[derive(Debug, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
}

/// Resolves role names to tenant-scoped role ids
async fn tenant_role_ids(state: &AppState, names: &[String]) -> ApiResult<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(names.len());

    for name in names {
        let role = Role::find_by_name(&state.db, name)
            .await?
            .filter(|role| role.assignable_to(false))
            .ok_or_else(|| ApiError::invalid("roles", format!("Unknown role '{}'", name)))?;
        ids.push(role.id);
    }

    Ok(ids)
}

async fn role_names(state: &AppState, user_id: Uuid) -> ApiResult<Vec<String>> {
    Ok(Role::list_for_user(&state.db, user_id)
        .await?
        .into_iter()
        .map(|role| role.name)
        .collect())
}

async fn find_member(state: &AppState, tenant_id: Uuid, id: Uuid) -> ApiResult<User> {
    User::find_in_tenant(&state.db, tenant_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<UserListResponse>> {
    let tenant_id = require_tenant(&auth)?;
    require_permission(&auth, Permission::ViewUsers)?;

    let users = User::list_by_tenant(&state.db, tenant_id, page.limit(), page.offset()).await?;
    let total = User::count_by_tenant(&state.db, tenant_id).await?;

    Ok(Json(UserListResponse { users, total }))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserDetail>)> {
    let tenant_id = require_tenant(&auth)?;
    require_permission(&auth, Permission::ManageUsers)?;
    req.validate()?;

    let password_hash = match req.password.as_deref() {
        Some(plain) => {
            password::validate_password_strength(plain)?;
            Some(password::hash_password(plain)?)
        }
        None => None,
    };

    let role_names = if req.roles.is_empty() {
        vec![DEFAULT_MEMBER_ROLE.to_string()]
    } else {
        req.roles
    };
    let role_ids = tenant_role_ids(&state, &role_names).await?;

    let mut tx = state.db.begin().await?;
    let user = User::create(
        &mut *tx,
        CreateUser {
            tenant_id: Some(tenant_id),
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            google_id: None,
            is_internal: false,
        },
    )
    .await?;

    for role_id in &role_ids {
        Role::assign_to_user(&mut *tx, user.id, *role_id).await?;
    }
    tx.commit().await?;

    info!(tenant_id = %tenant_id, user_id = %user.id, created_by = %auth.user_id, "User created");

    let roles = role_names_sorted(role_names);
    Ok((StatusCode::CREATED, Json(UserDetail { user, roles })))
}

fn role_names_sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<UserDetail>> {
    let tenant_id = require_tenant(&auth)?;
    require_permission(&auth, Permission::ViewUsers)?;

    let user = find_member(&state, tenant_id, id).await?;
    let roles = role_names(&state, user.id).await?;

    Ok(Json(UserDetail { user, roles }))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let tenant_id = require_tenant(&auth)?;
    require_permission(&auth, Permission::ManageUsers)?;
    req.validate()?;

    find_member(&state, tenant_id, id).await?;

    if id == auth.user_id && req.is_active == Some(false) {
        return Err(ApiError::BadRequest("You cannot deactivate your own account".to_string()));
    }

    let password_hash = match req.password.as_deref() {
        Some(plain) => {
            password::validate_password_strength(plain)?;
            Some(password::hash_password(plain)?)
        }
        None => None,
    };

    let user = User::update(
        &state.db,
        id,
        UpdateUser {
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            is_active: req.is_active,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Deletes a member; their vehicles and records go with them
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    let tenant_id = require_tenant(&auth)?;
    require_permission(&auth, Permission::ManageUsers)?;

    if id == auth.user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    let user = find_member(&state, tenant_id, id).await?;

    let mut files = Vec::new();
    for vehicle in Vehicle::list_by_owner(&state.db, tenant_id, user.id).await? {
        files.extend(Vehicle::stored_files(&state.db, vehicle.id).await?);
    }

    User::delete(&state.db, user.id).await?;
    state.storage.remove_all(files).await;

    info!(tenant_id = %tenant_id, user_id = %user.id, deleted_by = %auth.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Replaces the roles of a member
pub async fn set_roles(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SetRolesRequest>,
) -> ApiResult<Json<UserDetail>> {
    let tenant_id = require_tenant(&auth)?;
    require_permission(&auth, Permission::ManageUsers)?;

    if req.roles.is_empty() {
        return Err(ApiError::invalid("roles", "At least one role is required"));
    }

    let user = find_member(&state, tenant_id, id).await?;
    let role_ids = tenant_role_ids(&state, &req.roles).await?;

    Role::replace_for_user(&state.db, user.id, &role_ids).await?;

    info!(user_id = %user.id, roles = ?req.roles, changed_by = %auth.user_id, "User roles replaced");

    Ok(Json(UserDetail {
        user,
        roles: role_names_sorted(req.roles),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_nullable_fields() {
        let req: UpdateUserRequest =
            serde_json::from_str(r#"{"phone": null, "is_active": false}"#).unwrap();

        assert_eq!(req.phone, Some(None));
        assert_eq!(req.first_name, None);
        assert_eq!(req.is_active, Some(false));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_defaults_to_no_roles() {
        let req: CreateUserRequest =
            serde_json::from_str(r#"{"email": "chauffeur@transports-martin.fr"}"#).unwrap();

        assert!(req.roles.is_empty());
        assert!(req.password.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_role_names_sorted() {
        let names = vec!["manager".to_string(), "driver".to_string(), "manager".to_string()];
        assert_eq!(role_names_sorted(names), vec!["driver", "manager"]);
    }
}
