/// Password hashing module using Argon2id
///
/// # Security
///
/// - **Algorithm**: Argon2id
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
/// - **Output**: 32-byte hash
///
/// Parameters are embedded in the PHC string, so hashes created with older
/// parameters keep verifying after a change.
///
/// # Example
///
/// ```
/// use flotteq_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("flotte2025")?;
///
/// assert!(verify_password("flotte2025", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Longer inputs are rejected before hashing
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Password doesn't meet the strength rule
    #[error("{0}")]
    TooWeak(String),
}

/// Hashes a password using Argon2id with a random 16-byte salt
///
/// # Returns
///
/// PHC string format hash, e.g. `$argon2id$v=19$m=65536,t=3,p=4$...`
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(65536) // 64 MB
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a hash (constant-time comparison)
///
/// # Returns
///
/// `Ok(true)` if password matches, `Ok(false)` if it doesn't match
///
/// # Errors
///
/// Returns an error if the stored hash can't be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Validates password strength
///
/// A password must:
/// - be between 8 and 128 characters long
/// - contain at least one letter
/// - contain at least one digit
///
/// # Example
///
/// ```
/// use flotteq_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("camion2025").is_ok());
/// assert!(validate_password_strength("camion").is_err());
/// assert!(validate_password_strength("12345678").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooWeak(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::TooWeak(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        )));
    }

    if !password.chars().any(char::is_alphabetic) {
        return Err(PasswordError::TooWeak(
            "Password must contain at least one letter".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::TooWeak(
            "Password must contain at least one digit".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("garage-dupont-42").expect("Should hash");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("m=65536,t=3,p=4"));
        assert!(verify_password("garage-dupont-42", &hash).unwrap());
        assert!(!verify_password("garage-dupont-43", &hash).unwrap());
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let a = hash_password("password1").unwrap();
        let b = hash_password("password1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        let result = verify_password("password1", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::InvalidHash(_))));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("flotte2025").is_ok());
        assert!(validate_password_strength("Véhicule1").is_ok());

        assert!(validate_password_strength("abc1").is_err());
        assert!(validate_password_strength("onlyletters").is_err());
        assert!(validate_password_strength("1234567890").is_err());
        assert!(validate_password_strength(&format!("a1{}", "x".repeat(MAX_PASSWORD_LENGTH))).is_err());
    }

    #[test]
    fn test_strength_error_message() {
        let err = validate_password_strength("short1").unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 8 characters long");
    }
}
