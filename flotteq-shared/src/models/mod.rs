/// Database models for FlotteQ
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `tenant`: Customer organizations, the unit of data isolation
/// - `user`: User accounts (tenant members and internal staff)
/// - `role`: Roles, permissions and their assignment to users
/// - `subscription`: Plans and user enrollments
/// - `vehicle`: Fleet vehicles owned by a user within a tenant
/// - `maintenance`: Maintenance/repair records and replaced parts
/// - `invoice`: Vehicle expenses with optional stored document
/// - `inspection`: Contrôle technique records and reminder bookkeeping
/// - `photo`: Vehicle photos
///
/// Enumerated columns are stored as VARCHAR with a CHECK constraint. Their
/// Rust enums convert with `as_str` on the way in and `TryFrom<String>` on
/// the way out.
///
/// # Example
///
/// ```no_run
/// use flotteq_shared::models::vehicle::Vehicle;
/// use flotteq_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(tenant_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
///
/// let vehicles = Vehicle::list_by_owner(&pool, tenant_id, user_id).await?;
/// # Ok(())
/// # }
/// ```

pub mod inspection;
pub mod invoice;
pub mod maintenance;
pub mod photo;
pub mod role;
pub mod subscription;
pub mod tenant;
pub mod user;
pub mod vehicle;

/// A stored value that doesn't match any variant of its enum
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
