/// User model and database operations
///
/// This module provides the User model and CRUD operations for managing user accounts.
/// A user belongs to exactly one tenant, except internal staff who have no tenant
/// (`tenant_id IS NULL`, `is_internal = true`), enforced by a CHECK constraint.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     tenant_id UUID REFERENCES tenants(id) ON DELETE CASCADE,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255),
///     first_name VARCHAR(100),
///     last_name VARCHAR(100),
///     phone VARCHAR(50),
///     google_id VARCHAR(255) UNIQUE,
///     is_internal BOOLEAN NOT NULL DEFAULT FALSE,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// Emails are stored lowercase; every lookup normalizes its input first.
///
/// # Example
///
/// ```no_run
/// use flotteq_shared::models::user::{User, CreateUser};
/// use flotteq_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(tenant_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
///
/// let new_user = CreateUser {
///     tenant_id: Some(tenant_id),
///     email: "chauffeur@transports-martin.fr".to_string(),
///     password_hash: Some("$argon2id$...".to_string()),
///     first_name: Some("Luc".to_string()),
///     last_name: Some("Martin".to_string()),
///     phone: None,
///     google_id: None,
///     is_internal: false,
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// println!("Created user: {}", user.id);
///
/// let found = User::find_by_email(&pool, "Chauffeur@Transports-Martin.fr").await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, tenant_id, email, password_hash, first_name, last_name, phone, \
     google_id, is_internal, is_active, created_at, updated_at, last_login_at";

/// User model representing a user account
///
/// Passwords are stored as Argon2id hashes, never in plaintext. Accounts created
/// through Google sign-in have no password hash until one is set.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Owning tenant, None for internal staff
    pub tenant_id: Option<Uuid>,

    /// Email address, lowercase, unique across all users
    pub email: String,

    /// Argon2id password hash
    ///
    /// Never serialized into API responses.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub phone: Option<String>,

    /// Google account subject, set once the account is linked
    #[serde(skip_serializing)]
    pub google_id: Option<String>,

    /// Platform staff (back-office), never tenant-scoped
    pub is_internal: bool,

    /// Deactivated users cannot authenticate
    pub is_active: bool,

    /// When the user account was created
    pub created_at: DateTime<Utc>,

    /// When the user account was last updated
    pub updated_at: DateTime<Utc>,

    /// When the user last logged in (None if never logged in)
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Owning tenant (must be None exactly when `is_internal` is true)
    pub tenant_id: Option<Uuid>,

    /// Email address (lowercased before insert)
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub phone: Option<String>,

    pub google_id: Option<String>,

    pub is_internal: bool,
}

/// Input for updating an existing user
///
/// All fields are optional. Only non-None fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    /// New email address
    pub email: Option<String>,

    /// New password hash
    pub password_hash: Option<String>,

    /// New first name (use Some(None) to clear)
    pub first_name: Option<Option<String>>,

    /// New last name (use Some(None) to clear)
    pub last_name: Option<Option<String>>,

    /// New phone (use Some(None) to clear)
    pub phone: Option<Option<String>>,

    /// Activate or deactivate the account
    pub is_active: Option<bool>,
}

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Display name built from first and last names, falling back to the email
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => self.email.clone(),
        }
    }

    /// Creates a new user in the database
    ///
    /// Accepts any executor so the first user of a tenant can be created in the
    /// same transaction as the tenant itself.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email or Google id already exists (unique constraint violation)
    /// - `tenant_id`/`is_internal` are inconsistent (check constraint violation)
    /// - Database connection fails
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateUser,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (tenant_id, email, password_hash, first_name, last_name, phone, google_id, is_internal) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.tenant_id)
            .bind(normalize_email(&data.email))
            .bind(data.password_hash)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.phone)
            .bind(data.google_id)
            .bind(data.is_internal)
            .fetch_one(executor)
            .await
    }

    /// Finds a user by ID
    ///
    /// # Returns
    ///
    /// The user if found, None otherwise
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by ID, restricted to one tenant
    ///
    /// Used by tenant user management so a tenant admin can never address a
    /// user of another tenant.
    pub async fn find_in_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND tenant_id = $2");

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by email address (case-insensitive)
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use flotteq_shared::models::user::User;
    /// # use sqlx::PgPool;
    /// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
    /// if let Some(user) = User::find_by_email(&pool, "user@example.com").await? {
    ///     println!("Found user: {}", user.id);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by linked Google account subject
    pub async fn find_by_google_id(
        pool: &PgPool,
        google_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = $1");

        sqlx::query_as::<_, User>(&query)
            .bind(google_id)
            .fetch_optional(pool)
            .await
    }

    /// Links a Google account to an existing user
    ///
    /// # Returns
    ///
    /// The updated user, or None if the user doesn't exist
    pub async fn link_google_account(
        pool: &PgPool,
        id: Uuid,
        google_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET google_id = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(google_id)
            .fetch_optional(pool)
            .await
    }

    /// Updates an existing user
    ///
    /// Only non-None fields in `data` will be updated. The `updated_at` timestamp
    /// is automatically set to the current time.
    ///
    /// # Returns
    ///
    /// The updated user if found, None if user doesn't exist
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use flotteq_shared::models::user::{User, UpdateUser};
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    /// let update = UpdateUser {
    ///     first_name: Some(Some("Jeanne".to_string())),
    ///     is_active: Some(false),
    ///     ..Default::default()
    /// };
    ///
    /// if let Some(user) = User::update(&pool, user_id, update).await? {
    ///     println!("Updated user: {}", user.email);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build dynamic update query based on which fields are present
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }
        if data.first_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", first_name = ${}", bind_count));
        }
        if data.last_name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", last_name = ${}", bind_count));
        }
        if data.phone.is_some() {
            bind_count += 1;
            query.push_str(&format!(", phone = ${}", bind_count));
        }
        if data.is_active.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_active = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(email) = data.email {
            q = q.bind(normalize_email(&email));
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(first_name) = data.first_name {
            q = q.bind(first_name);
        }
        if let Some(last_name) = data.last_name {
            q = q.bind(last_name);
        }
        if let Some(phone) = data.phone {
            q = q.bind(phone);
        }
        if let Some(active) = data.is_active {
            q = q.bind(active);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a user by ID
    ///
    /// ⚠️  **WARNING**: Cascades to the user's vehicles, their records and the
    /// user's subscriptions.
    ///
    /// # Returns
    ///
    /// True if user was deleted, false if user didn't exist
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Updates the last login timestamp for a user
    ///
    /// Called after every successful authentication (password or Google).
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists the users of one tenant, ordered by creation date (newest first)
    pub async fn list_by_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Counts the users of one tenant
    pub async fn count_by_tenant(pool: &PgPool, tenant_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Counts all users on the platform
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            tenant_id: Some(Uuid::new_v4()),
            email: "luc@example.com".to_string(),
            password_hash: Some("$argon2id$hash".to_string()),
            first_name: first.map(str::to_string),
            last_name: last.map(str::to_string),
            phone: None,
            google_id: Some("1234".to_string()),
            is_internal: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        }
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Luc.Martin@Example.COM "), "luc.martin@example.com");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(user(Some("Luc"), Some("Martin")).display_name(), "Luc Martin");
        assert_eq!(user(None, Some("Martin")).display_name(), "Martin");
        assert_eq!(user(None, None).display_name(), "luc@example.com");
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let json = serde_json::to_value(user(Some("Luc"), None)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("google_id").is_none());
        assert_eq!(json["email"], "luc@example.com");
    }

    #[test]
    fn test_update_user_default() {
        let update = UpdateUser::default();
        assert!(update.email.is_none());
        assert!(update.first_name.is_none());
        assert!(update.is_active.is_none());
    }
}
