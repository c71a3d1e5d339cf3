/// Tenant (entreprise) model and database operations
///
/// A tenant is a customer organization and the unit of data isolation. Every
/// non-internal user belongs to exactly one tenant; vehicles and all of their
/// records carry the tenant id as well.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tenants (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     contact_email VARCHAR(255),
///     phone VARCHAR(50),
///     address TEXT,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     settings JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Deleting a tenant cascades to its users, and from there to vehicles,
/// subscriptions and every vehicle record.
///
/// # Example
///
/// ```no_run
/// use flotteq_shared::models::tenant::{Tenant, CreateTenant};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let tenant = Tenant::create(&pool, CreateTenant {
///     name: "Transports Martin".to_string(),
///     contact_email: Some("contact@transports-martin.fr".to_string()),
///     phone: None,
///     address: None,
/// }).await?;
///
/// println!("Created tenant: {}", tenant.id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const TENANT_COLUMNS: &str =
    "id, name, contact_email, phone, address, is_active, settings, created_at, updated_at";

/// Tenant model representing a customer organization
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    /// Unique tenant ID
    pub id: Uuid,

    /// Company name
    pub name: String,

    /// Billing/contact email
    pub contact_email: Option<String>,

    /// Contact phone number
    pub phone: Option<String>,

    /// Postal address
    pub address: Option<String>,

    /// Deactivated tenants cannot authenticate
    pub is_active: bool,

    /// Tenant-specific preferences (JSONB), merged on update
    pub settings: JsonValue,

    /// When the tenant was created
    pub created_at: DateTime<Utc>,

    /// When the tenant was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Input for updating an existing tenant
///
/// Only `Some` fields are written. `settings` is merged into the stored JSON
/// with the `||` operator rather than replacing it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
    pub settings: Option<JsonValue>,
}

/// Tenant row with usage counters for the back-office listing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub user_count: i64,
    pub vehicle_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Creates a new tenant
    ///
    /// Accepts any executor so registration can create the tenant and its
    /// first user inside one transaction.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        data: CreateTenant,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO tenants (name, contact_email, phone, address) \
             VALUES ($1, $2, $3, $4) RETURNING {TENANT_COLUMNS}"
        );

        sqlx::query_as::<_, Tenant>(&query)
            .bind(data.name)
            .bind(data.contact_email)
            .bind(data.phone)
            .bind(data.address)
            .fetch_one(executor)
            .await
    }

    /// Finds a tenant by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1");

        sqlx::query_as::<_, Tenant>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Updates an existing tenant
    ///
    /// # Returns
    ///
    /// The updated tenant, or None if it doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateTenant,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE tenants SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.contact_email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", contact_email = ${}", bind_count));
        }
        if data.phone.is_some() {
            bind_count += 1;
            query.push_str(&format!(", phone = ${}", bind_count));
        }
        if data.address.is_some() {
            bind_count += 1;
            query.push_str(&format!(", address = ${}", bind_count));
        }
        if data.is_active.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_active = ${}", bind_count));
        }
        if data.settings.is_some() {
            bind_count += 1;
            query.push_str(&format!(", settings = settings || ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {TENANT_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Tenant>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(email) = data.contact_email {
            q = q.bind(email);
        }
        if let Some(phone) = data.phone {
            q = q.bind(phone);
        }
        if let Some(address) = data.address {
            q = q.bind(address);
        }
        if let Some(active) = data.is_active {
            q = q.bind(active);
        }
        if let Some(settings) = data.settings {
            q = q.bind(settings);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a tenant by ID
    ///
    /// ⚠️ Cascades to users, vehicles and every vehicle record. Uploaded
    /// files are not removed by the database.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Relative paths of every uploaded file in the tenant
    pub async fn stored_files(pool: &PgPool, id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT file_path FROM photos WHERE tenant_id = $1
            UNION ALL
            SELECT document_path FROM invoices WHERE tenant_id = $1 AND document_path IS NOT NULL
            UNION ALL
            SELECT report_path FROM technical_inspections WHERE tenant_id = $1 AND report_path IS NOT NULL
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }

    /// Lists tenants with user and vehicle counts, newest first
    pub async fn list_summaries(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TenantSummary>, sqlx::Error> {
        sqlx::query_as::<_, TenantSummary>(
            r#"
            SELECT t.id, t.name, t.is_active,
                   (SELECT COUNT(*) FROM users u WHERE u.tenant_id = t.id) AS user_count,
                   (SELECT COUNT(*) FROM vehicles v WHERE v.tenant_id = t.id) AS vehicle_count,
                   t.created_at
            FROM tenants t
            ORDER BY t.created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Counts total number of tenants
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tenants")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
