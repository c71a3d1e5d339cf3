/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength rule
/// - [`jwt`]: JWT token generation and validation
/// - [`middleware`]: Request identity (`AuthContext`) resolved from a token
/// - [`authorization`]: Named permissions and tenant/staff checks
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **JWT Tokens**: HS256 signing; access, refresh and OAuth-state token types
/// - **Per-request tenancy**: roles and account status reloaded for every request
///
/// # Example
///
/// ```no_run
/// use flotteq_shared::auth::password::{hash_password, verify_password};
/// use flotteq_shared::auth::jwt::{create_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("camion2025")?;
/// assert!(verify_password("camion2025", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), Some(Uuid::new_v4()), TokenType::Access);
/// let token = create_token(&claims, "secret-key-at-least-32-bytes-long")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
