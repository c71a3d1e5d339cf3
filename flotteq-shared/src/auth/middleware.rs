/// Request identity for Axum handlers
///
/// The API's authentication layer turns a bearer token into an [`AuthContext`]
/// and stores it in the request extensions. Tenancy is resolved per request:
/// the token only names the user, and [`AuthContext::resolve`] reloads the
/// user, its tenant and its permissions from the database every time.
///
/// # Request Extensions
///
/// After successful authentication, the layer adds:
/// - `AuthContext`: user id, tenant id (None for staff), staff flag, permission set
///
/// # Example
///
/// ```no_run
/// use axum::Extension;
/// use flotteq_shared::auth::authorization::Permission;
/// use flotteq_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     if auth.has_permission(Permission::ViewVehicles) {
///         format!("User {} may list vehicles", auth.user_id)
///     } else {
///         "Forbidden".to_string()
///     }
/// }
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use super::authorization::Permission;
use super::jwt::Claims;
use crate::models::{role::Role, tenant::Tenant, user::User};

/// Authentication context added to request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Tenant of the user, None for internal staff
    pub tenant_id: Option<Uuid>,

    /// Platform staff flag
    pub is_internal: bool,

    /// Flattened permission names granted through the user's roles
    pub permissions: HashSet<String>,
}

impl AuthContext {
    /// Builds a context from already-loaded parts
    pub fn new(
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        is_internal: bool,
        permissions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            user_id,
            tenant_id,
            is_internal,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// Resolves the identity named by validated token claims
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the user no longer exists or changed tenant
    /// - `AccountDisabled` if the user or their tenant is deactivated
    /// - `DatabaseError` on query failure
    pub async fn resolve(pool: &PgPool, claims: &Claims) -> Result<Self, AuthError> {
        let user = User::find_by_id(pool, claims.sub)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("Unknown user".to_string()))?;

        Self::for_user(pool, &user, claims.tenant_id).await
    }

    /// Resolves the identity of a user loaded by the caller
    ///
    /// `expected_tenant` is the tenant recorded in the token, if any. A user
    /// moved to another tenant since the token was issued is rejected.
    pub async fn for_user(
        pool: &PgPool,
        user: &User,
        expected_tenant: Option<Uuid>,
    ) -> Result<Self, AuthError> {
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if user.tenant_id != expected_tenant {
            return Err(AuthError::InvalidToken("Tenant mismatch".to_string()));
        }

        if let Some(tenant_id) = user.tenant_id {
            let tenant = Tenant::find_by_id(pool, tenant_id)
                .await?
                .ok_or_else(|| AuthError::InvalidToken("Unknown tenant".to_string()))?;

            if !tenant.is_active {
                return Err(AuthError::AccountDisabled);
            }
        }

        let permissions = Role::permissions_for_user(pool, user.id).await?;

        Ok(Self::new(user.id, user.tenant_id, user.is_internal, permissions))
    }

    /// Checks a named permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(permission.as_str())
    }

    /// Sorted permission names, for responses
    pub fn permission_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.permissions.iter().cloned().collect();
        names.sort();
        names
    }
}

/// Error type for authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingCredentials,

    /// Invalid authorization header format
    #[error("{0}")]
    InvalidFormat(String),

    /// Token validation failed or names nobody
    #[error("{0}")]
    InvalidToken(String),

    /// User or tenant is deactivated
    #[error("Account is disabled")]
    AccountDisabled,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials
            | AuthError::InvalidFormat(_)
            | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::AccountDisabled => StatusCode::FORBIDDEN,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials
            | AuthError::InvalidFormat(_)
            | AuthError::InvalidToken(_) => "unauthorized",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::DatabaseError(_) => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::DatabaseError(e) => {
                tracing::error!(error = %e, "Database error during authentication");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }));

        (self.status(), body).into_response()
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_auth_context_permissions() {
        let context = AuthContext::new(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            false,
            vec!["view vehicles".to_string(), "create vehicles".to_string()],
        );

        assert!(context.has_permission(Permission::ViewVehicles));
        assert!(context.has_permission(Permission::CreateVehicles));
        assert!(!context.has_permission(Permission::DeleteVehicles));
        assert_eq!(
            context.permission_names(),
            vec!["create vehicles".to_string(), "view vehicles".to_string()]
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingCredentials)));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_auth_error_into_response() {
        let response = AuthError::MissingCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::InvalidFormat("test".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthError::AccountDisabled.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = AuthError::DatabaseError(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
