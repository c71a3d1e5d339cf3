/// Role and permission models
///
/// Authorization follows a role → permission graph: users hold roles
/// (`user_roles`), roles grant named permissions (`role_permissions`), and a
/// request is authorized against the flattened permission set of its user.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE roles (
///     id UUID PRIMARY KEY,
///     name VARCHAR(100) NOT NULL UNIQUE,
///     scope VARCHAR(20) NOT NULL DEFAULT 'tenant'   -- 'tenant' | 'internal'
/// );
/// CREATE TABLE permissions (id UUID PRIMARY KEY, name VARCHAR(100) NOT NULL UNIQUE);
/// CREATE TABLE role_permissions (role_id UUID, permission_id UUID, PRIMARY KEY (role_id, permission_id));
/// CREATE TABLE user_roles (user_id UUID, role_id UUID, PRIMARY KEY (user_id, role_id));
/// ```
///
/// # Default roles
///
/// Seeded by the migrations:
///
/// - **admin** (tenant): vehicles, tenant users, subscription
/// - **manager** (tenant): view/create/edit vehicles, view users
/// - **driver** (tenant): full control of own vehicles, subscription
/// - **super_admin** (internal): users, analytics, tenants, plans
/// - **support** (internal): view users, analytics
///
/// # Example
///
/// ```no_run
/// use flotteq_shared::models::role::{Role, DEFAULT_MEMBER_ROLE};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let role = Role::find_by_name(&pool, DEFAULT_MEMBER_ROLE).await?.expect("seeded");
/// Role::assign_to_user(&pool, user_id, role.id).await?;
///
/// let permissions = Role::permissions_for_user(&pool, user_id).await?;
/// assert!(permissions.iter().any(|p| p == "create vehicles"));
/// # Ok(())
/// # }
/// ```

use super::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::str::FromStr;
use uuid::Uuid;

/// Role given to the user who registers a new tenant
pub const TENANT_ADMIN_ROLE: &str = "admin";

/// Role given to users invited into a tenant when none is requested
pub const DEFAULT_MEMBER_ROLE: &str = "driver";

/// Who a role is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleScope {
    /// Assignable to tenant members
    Tenant,

    /// Assignable to platform staff only
    Internal,
}

impl RoleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleScope::Tenant => "tenant",
            RoleScope::Internal => "internal",
        }
    }
}

impl FromStr for RoleScope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tenant" => Ok(RoleScope::Tenant),
            "internal" => Ok(RoleScope::Internal),
            other => Err(UnknownVariant::new("role scope", other)),
        }
    }
}

impl TryFrom<String> for RoleScope {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A named role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,

    /// Unique role name (e.g. "admin")
    pub name: String,

    #[sqlx(try_from = "String")]
    pub scope: RoleScope,

    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Whether a user with the given `is_internal` flag may hold this role
    pub fn assignable_to(&self, is_internal: bool) -> bool {
        match self.scope {
            RoleScope::Tenant => !is_internal,
            RoleScope::Internal => is_internal,
        }
    }

    /// Finds a role by its unique name
    pub async fn find_by_name<'e>(
        executor: impl PgExecutor<'e>,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>("SELECT id, name, scope, created_at FROM roles WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// Lists roles of one scope, ordered by name
    pub async fn list_by_scope(pool: &PgPool, scope: RoleScope) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            "SELECT id, name, scope, created_at FROM roles WHERE scope = $1 ORDER BY name",
        )
        .bind(scope.as_str())
        .fetch_all(pool)
        .await
    }

    /// Grants a role to a user (idempotent)
    pub async fn assign_to_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Removes a role from a user
    ///
    /// # Returns
    ///
    /// True if the user held the role
    pub async fn revoke_from_user<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces every role of a user in one transaction
    pub async fn replace_for_user(
        pool: &PgPool,
        user_id: Uuid,
        role_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for role_id in role_ids {
            Self::assign_to_user(&mut *tx, user_id, *role_id).await?;
        }

        tx.commit().await
    }

    /// Lists the roles held by a user
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.scope, r.created_at
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Flattened permission names granted to a user through all of their roles
    pub async fn permissions_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.name
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN user_roles ur ON ur.role_id = rp.role_id
            WHERE ur.user_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(scope: RoleScope) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: "admin".to_string(),
            scope,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_scope_parsing() {
        assert_eq!("tenant".parse::<RoleScope>().unwrap(), RoleScope::Tenant);
        assert_eq!(RoleScope::try_from("internal".to_string()).unwrap(), RoleScope::Internal);
        assert!("global".parse::<RoleScope>().is_err());
    }

    #[test]
    fn test_role_assignability() {
        assert!(role(RoleScope::Tenant).assignable_to(false));
        assert!(!role(RoleScope::Tenant).assignable_to(true));
        assert!(role(RoleScope::Internal).assignable_to(true));
        assert!(!role(RoleScope::Internal).assignable_to(false));
    }
}
