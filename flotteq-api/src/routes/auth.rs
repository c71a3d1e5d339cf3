/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/auth/register` - Create a company (tenant) and its admin user
/// - `POST /api/auth/login` - Login and get tokens
/// - `POST /api/auth/refresh` - Refresh access token
/// - `GET  /api/auth/me` - Current identity, roles and permissions
/// - `GET  /api/auth/google` - Google authorize URL with a signed state
/// - `POST /api/auth/google/callback` - Exchange the Google code for tokens
///
/// Every successful sign-in returns the same [`AuthResponse`].

use crate::{
    app::AppState,
    config::GoogleConfig,
    error::{ApiError, ApiResult},
    extract::{ApiJson},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use flotteq_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::{
        role::{Role, TENANT_ADMIN_ROLE},
        tenant::{CreateTenant, Tenant},
        user::{normalize_email, CreateUser, User},
    },
    quota::{QuotaEnforcer, QuotaUsage},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Company name, becomes the tenant
    #[validate(length(min = 1, max = 255, message = "Company name is required"))]
    pub company_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (will be validated for strength)
    pub password: String,

    #[validate(length(max = 100, message = "First name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[validate(length(max = 100, message = "Last name must be at most 100 characters"))]
    pub last_name: Option<String>,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Tokens and identity returned by every sign-in
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    pub user: User,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Current identity
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub tenant: Option<Tenant>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,

    /// Vehicle quota, tenant members only
    pub quota: Option<QuotaUsage>,
}

#[derive(Debug, Serialize)]
pub struct GoogleAuthorizeResponse {
    pub url: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
    given_name: Option<String>,
    family_name: Option<String>,
}

/// Issues an access/refresh pair for a user
fn issue_tokens(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let access_claims = jwt::Claims::new(user.id, user.tenant_id, jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(user.id, user.tenant_id, jwt::TokenType::Refresh);

    Ok(AuthResponse {
        access_token: jwt::create_token(&access_claims, state.jwt_secret())?,
        refresh_token: jwt::create_token(&refresh_claims, state.jwt_secret())?,
        token_type: "Bearer",
        expires_in: jwt::TokenType::Access.default_expiration().num_seconds(),
        user,
    })
}

/// Creates a tenant and its first user, holding the tenant admin role
async fn create_tenant_with_admin(
    state: &AppState,
    tenant: CreateTenant,
    admin: CreateUser,
) -> ApiResult<User> {
    let mut tx = state.db.begin().await?;

    let tenant = Tenant::create(&mut *tx, tenant).await?;
    let user = User::create(
        &mut *tx,
        CreateUser {
            tenant_id: Some(tenant.id),
            is_internal: false,
            ..admin
        },
    )
    .await?;

    let role = Role::find_by_name(&mut *tx, TENANT_ADMIN_ROLE)
        .await?
        .ok_or_else(|| ApiError::InternalError(format!("Role '{}' is not seeded", TENANT_ADMIN_ROLE)))?;
    Role::assign_to_user(&mut *tx, user.id, role.id).await?;

    tx.commit().await?;

    info!(tenant_id = %tenant.id, user_id = %user.id, "Tenant registered");
    Ok(user)
}

/// Register a company and its admin user
///
/// ```text
/// POST /api/auth/register
///
/// {
///   "company_name": "Transports Martin",
///   "email": "claire@transports-martin.fr",
///   "password": "flotte2025",
///   "first_name": "Claire"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;
    let email = normalize_email(&req.email);

    let user = create_tenant_with_admin(
        &state,
        CreateTenant {
            name: req.company_name.trim().to_string(),
            contact_email: Some(email.clone()),
            phone: req.phone.clone(),
            address: None,
        },
        CreateUser {
            tenant_id: None,
            email,
            password_hash: Some(password_hash),
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            google_id: None,
            is_internal: false,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

/// Email/password login
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: User or tenant deactivated
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    // Google-only accounts have no password
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !password::verify_password(&req.password, hash)? {
        warn!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }

    AuthContext::for_user(&state.db, &user, user.tenant_id).await?;
    User::update_last_login(&state.db, user.id).await?;

    Ok(Json(issue_tokens(&state, user)?))
}

/// Exchanges a refresh token for a new access token
///
/// The user is re-checked, so a deactivated account can't refresh.
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;
    let auth = AuthContext::resolve(&state.db, &claims).await?;

    let access_claims = jwt::Claims::new(auth.user_id, auth.tenant_id, jwt::TokenType::Access);

    Ok(Json(RefreshResponse {
        access_token: jwt::create_token(&access_claims, state.jwt_secret())?,
        token_type: "Bearer",
        expires_in: jwt::TokenType::Access.default_expiration().num_seconds(),
    }))
}

/// Current identity with roles, permissions, tenant and quota
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    let roles = Role::list_for_user(&state.db, user.id)
        .await?
        .into_iter()
        .map(|role| role.name)
        .collect();

    let (tenant, quota) = match auth.tenant_id {
        Some(tenant_id) => (
            Tenant::find_by_id(&state.db, tenant_id).await?,
            Some(QuotaEnforcer::new(state.db.clone()).usage(user.id).await?),
        ),
        None => (None, None),
    };

    Ok(Json(MeResponse {
        user,
        tenant,
        roles,
        permissions: auth.permission_names(),
        quota,
    }))
}

fn google_config(state: &AppState) -> ApiResult<&GoogleConfig> {
    state
        .config
        .google
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("Google sign-in is not configured".to_string()))
}

/// Google authorize URL
///
/// The `state` parameter is a short-lived signed token; the callback rejects
/// any state it didn't issue.
pub async fn google_authorize(State(state): State<AppState>) -> ApiResult<Json<GoogleAuthorizeResponse>> {
    let google = google_config(&state)?;
    let oauth_state = jwt::create_oauth_state(state.jwt_secret())?;

    let url = reqwest::Url::parse_with_params(
        GOOGLE_AUTHORIZE_URL,
        &[
            ("client_id", google.client_id.as_str()),
            ("redirect_uri", google.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", oauth_state.as_str()),
            ("prompt", "select_account"),
        ],
    )
    .map_err(|e| ApiError::InternalError(format!("Invalid Google authorize URL: {}", e)))?;

    Ok(Json(GoogleAuthorizeResponse {
        url: url.to_string(),
        state: oauth_state,
    }))
}

/// Google sign-in callback
///
/// Resolution order for the Google profile:
/// 1. a user already linked to the Google subject signs in
/// 2. a user with the same (verified) email gets the account linked
/// 3. otherwise a new company is created with the user as its admin
pub async fn google_callback(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GoogleCallbackRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let google = google_config(&state)?;
    jwt::validate_oauth_state(&req.state, state.jwt_secret())?;

    let profile = fetch_google_profile(&state, google, &req.code).await?;
    if !profile.email_verified {
        return Err(ApiError::Unauthorized("Google email address is not verified".to_string()));
    }

    let user = match User::find_by_google_id(&state.db, &profile.sub).await? {
        Some(user) => user,
        None => match User::find_by_email(&state.db, &profile.email).await? {
            Some(existing) => {
                info!(user_id = %existing.id, "Linking Google account");
                User::link_google_account(&state.db, existing.id, &profile.sub)
                    .await?
                    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?
            }
            None => {
                let company = match (&profile.given_name, &profile.family_name) {
                    (Some(first), Some(last)) => format!("{} {}", first, last),
                    (Some(name), None) | (None, Some(name)) => name.clone(),
                    (None, None) => profile.email.clone(),
                };

                create_tenant_with_admin(
                    &state,
                    CreateTenant {
                        name: company,
                        contact_email: Some(normalize_email(&profile.email)),
                        phone: None,
                        address: None,
                    },
                    CreateUser {
                        tenant_id: None,
                        email: profile.email.clone(),
                        password_hash: None,
                        first_name: profile.given_name.clone(),
                        last_name: profile.family_name.clone(),
                        phone: None,
                        google_id: Some(profile.sub.clone()),
                        is_internal: false,
                    },
                )
                .await?
            }
        },
    };

    AuthContext::for_user(&state.db, &user, user.tenant_id).await?;
    User::update_last_login(&state.db, user.id).await?;

    Ok(Json(issue_tokens(&state, user)?))
}

async fn fetch_google_profile(
    state: &AppState,
    google: &GoogleConfig,
    code: &str,
) -> ApiResult<GoogleUserInfo> {
    let token_response = state
        .http
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("code", code),
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("redirect_uri", google.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| ApiError::ServiceUnavailable(format!("Google token endpoint unreachable: {}", e)))?;

    if !token_response.status().is_success() {
        warn!(status = %token_response.status(), "Google rejected the authorization code");
        return Err(ApiError::Unauthorized("Invalid Google authorization code".to_string()));
    }

    let token: GoogleTokenResponse = token_response
        .json()
        .await
        .map_err(|e| ApiError::InternalError(format!("Unexpected Google token response: {}", e)))?;

    state
        .http
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| ApiError::ServiceUnavailable(format!("Google userinfo failed: {}", e)))?
        .json::<GoogleUserInfo>()
        .await
        .map_err(|e| ApiError::InternalError(format!("Unexpected Google userinfo response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_register_request_validation() {
        let req = RegisterRequest {
            company_name: String::new(),
            email: "not-an-email".to_string(),
            password: "flotte2025".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
        };

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("company_name"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_google_profile_defaults_unverified() {
        let profile: GoogleUserInfo =
            serde_json::from_str(r#"{"sub": "1234", "email": "a@b.fr"}"#).unwrap();
        assert!(!profile.email_verified);
        assert_eq!(profile.given_name, None);
    }

    #[test]
    fn test_auth_response_hides_secrets() {
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            email: "claire@transports-martin.fr".to_string(),
            password_hash: Some("$argon2id$...".to_string()),
            first_name: Some("Claire".to_string()),
            last_name: None,
            phone: None,
            google_id: Some("google-sub".to_string()),
            is_internal: false,
            is_active: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_value(AuthResponse {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: "Bearer",
            expires_in: 86_400,
            user,
        })
        .unwrap();

        assert!(json["user"].get("password_hash").is_none());
        assert!(json["user"].get("google_id").is_none());
        assert_eq!(json["token_type"], "Bearer");
    }
}
