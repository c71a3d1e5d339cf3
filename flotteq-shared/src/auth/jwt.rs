/// JWT token generation and validation module
///
/// Tokens are signed using HS256 (HMAC-SHA256) and carry the user id plus the
/// user's tenant. Internal staff have no tenant, so `tenant_id` is optional.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Validation**: Signature, expiration, not-before and issuer checks
/// - **Secret Management**: Secrets should be at least 32 bytes (256 bits)
///
/// The token only identifies the user. Roles, permissions and account status
/// are reloaded from the database on every request (see
/// [`AuthContext::resolve`](super::middleware::AuthContext::resolve)), so
/// revoking a role or deactivating a tenant takes effect immediately.
///
/// # Token Types
///
/// - **Access Token**: 24 hours, used for API authentication
/// - **Refresh Token**: 30 days, used to obtain new access tokens
/// - **OAuth State**: 10 minutes, signed `state` parameter of the Google sign-in round trip
///
/// # Example
///
/// ```
/// use flotteq_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let tenant_id = Uuid::new_v4();
///
/// let claims = Claims::new(user_id, Some(tenant_id), TokenType::Access);
/// let token = create_token(&claims, "your-secret-key-at-least-32-bytes")?;
///
/// let validated_claims = validate_token(&token, "your-secret-key-at-least-32-bytes")?;
/// assert_eq!(validated_claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer of every FlotteQ token
pub const ISSUER: &str = "flotteq";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token is valid but of the wrong kind for this use
    #[error("Expected {expected} token, got {actual} token")]
    WrongType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Invalid issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,
}

/// Token type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Access token (short-lived, 24 hours)
    Access,

    /// Refresh token (long-lived, 30 days)
    Refresh,

    /// Google sign-in state (10 minutes)
    OauthState,
}

impl TokenType {
    /// Gets default expiration duration for token type
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
            TokenType::OauthState => Duration::minutes(10),
        }
    }

    /// Gets token type as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
            TokenType::OauthState => "oauth_state",
        }
    }
}

/// JWT claims structure
///
/// # Standard Claims
///
/// - `sub`: Subject (user ID, or a random nonce for OAuth state tokens)
/// - `iss`: Issuer (always "flotteq")
/// - `iat`, `exp`, `nbf`: Issued at, expiration, not before
///
/// # Custom Claims
///
/// - `tenant_id`: Tenant of the user, absent for internal staff
/// - `token_type`: Access, refresh or OAuth state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issuer - Always "flotteq"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Tenant ID, None for internal staff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,

    /// Token type (custom claim)
    pub token_type: TokenType,
}

impl Claims {
    /// Creates new claims with the default expiration of `token_type`
    pub fn new(user_id: Uuid, tenant_id: Option<Uuid>, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, tenant_id, token_type, token_type.default_expiration())
    }

    /// Creates claims with custom expiration
    ///
    /// # Example
    ///
    /// ```
    /// use flotteq_shared::auth::jwt::{Claims, TokenType};
    /// use chrono::Duration;
    /// use uuid::Uuid;
    ///
    /// let claims = Claims::with_expiration(
    ///     Uuid::new_v4(),
    ///     None,
    ///     TokenType::Access,
    ///     Duration::hours(1),
    /// );
    /// assert!(!claims.is_expired());
    /// ```
    pub fn with_expiration(
        user_id: Uuid,
        tenant_id: Option<Uuid>,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            tenant_id,
            token_type,
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Gets time until expiration
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Creates a JWT token from claims
///
/// # Errors
///
/// Returns `JwtError::CreateError` if token creation fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT token and extracts claims
///
/// Verifies:
/// - Signature is valid
/// - Token hasn't expired
/// - Issuer is "flotteq"
/// - Token is not used before nbf time
///
/// The token type is not checked; use the typed wrappers below.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != expected {
        return Err(JwtError::WrongType {
            expected: expected.as_str(),
            actual: claims.token_type.as_str(),
        });
    }

    Ok(claims)
}

/// Validates token and checks it's an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

/// Validates token and checks it's a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Creates a signed, short-lived `state` value for the Google sign-in redirect
///
/// The subject is a random nonce; no user exists yet at this point.
pub fn create_oauth_state(secret: &str) -> Result<String, JwtError> {
    let claims = Claims::new(Uuid::new_v4(), None, TokenType::OauthState);
    create_token(&claims, secret)
}

/// Checks a `state` value returned by Google
pub fn validate_oauth_state(state: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(state, secret, TokenType::OauthState)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::hours(24));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(30));
        assert_eq!(TokenType::OauthState.default_expiration(), Duration::minutes(10));
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let claims = Claims::new(user_id, Some(tenant_id), TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tenant_id, Some(tenant_id));
        assert_eq!(claims.iss, "flotteq");
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let claims = Claims::new(user_id, Some(tenant_id), TokenType::Access);
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.tenant_id, Some(tenant_id));
        assert_eq!(validated.token_type, TokenType::Access);
    }

    #[test]
    fn test_staff_token_has_no_tenant_claim() {
        let claims = Claims::new(Uuid::new_v4(), None, TokenType::Access);

        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("tenant_id").is_none());

        let token = create_token(&claims, SECRET).unwrap();
        let validated = validate_access_token(&token, SECRET).unwrap();
        assert!(validated.tenant_id.is_none());
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let claims = Claims::new(Uuid::new_v4(), Some(Uuid::new_v4()), TokenType::Access);
        let token = create_token(&claims, "secret1").expect("Should create token");

        assert!(validate_token(&token, "wrong-secret").is_err());
    }

    #[test]
    fn test_validate_expired_token() {
        // Expired one hour ago, well past the default leeway
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            TokenType::Access,
            Duration::seconds(-3600),
        );

        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let access = create_token(
            &Claims::new(Uuid::new_v4(), Some(Uuid::new_v4()), TokenType::Access),
            SECRET,
        )
        .unwrap();
        let refresh = create_token(
            &Claims::new(Uuid::new_v4(), Some(Uuid::new_v4()), TokenType::Refresh),
            SECRET,
        )
        .unwrap();

        assert!(validate_access_token(&access, SECRET).is_ok());
        assert!(validate_refresh_token(&refresh, SECRET).is_ok());

        assert!(matches!(
            validate_access_token(&refresh, SECRET),
            Err(JwtError::WrongType { expected: "access", actual: "refresh" })
        ));
        assert!(validate_refresh_token(&access, SECRET).is_err());
        assert!(validate_oauth_state(&access, SECRET).is_err());
    }

    #[test]
    fn test_oauth_state_roundtrip() {
        let state = create_oauth_state(SECRET).unwrap();
        let claims = validate_oauth_state(&state, SECRET).unwrap();

        assert_eq!(claims.token_type, TokenType::OauthState);
        assert!(claims.tenant_id.is_none());
        assert!(claims.time_until_expiration().unwrap() <= Duration::minutes(10));

        assert!(validate_access_token(&state, SECRET).is_err());
    }
}
