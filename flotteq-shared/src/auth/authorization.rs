/// Authorization helpers and permission checks
///
/// # Permission Model
///
/// 1. **Permissions**: named capabilities stored in the `permissions` table
///    ("create vehicles", "manage users", ...), mirrored by [`Permission`]
/// 2. **Roles**: bundles of permissions, assigned to users
/// 3. **Tenancy**: tenant members only ever act inside their own tenant;
///    internal staff have no tenant and act through back-office routes only
/// 4. **Resource checks**: ownership of vehicles and their records lives in
///    [`crate::policy`]
///
/// # Example
///
/// ```
/// use flotteq_shared::auth::authorization::{require_permission, require_tenant, Permission};
/// use flotteq_shared::auth::middleware::AuthContext;
/// use uuid::Uuid;
///
/// let tenant_id = Uuid::new_v4();
/// let auth = AuthContext::new(Uuid::new_v4(), Some(tenant_id), false, vec!["view users".to_string()]);
///
/// assert!(require_permission(&auth, Permission::ViewUsers).is_ok());
/// assert!(require_permission(&auth, Permission::ManageUsers).is_err());
/// assert_eq!(require_tenant(&auth).unwrap(), tenant_id);
/// ```

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::UnknownVariant;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// User doesn't hold the permission
    #[error("Missing permission: {0}")]
    MissingPermission(Permission),

    /// Route is for tenant members and the user is internal staff
    #[error("This action requires a tenant account")]
    TenantRequired,

    /// Route is for internal staff only
    #[error("This action is restricted to platform staff")]
    InternalOnly,
}

/// Named permissions
///
/// The string forms match the rows seeded by the migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewVehicles,
    CreateVehicles,
    EditVehicles,
    DeleteVehicles,
    ViewUsers,
    ManageUsers,
    ManageSubscription,
    ViewAnalytics,
    ManageTenants,
    ManagePlans,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::ViewVehicles,
        Permission::CreateVehicles,
        Permission::EditVehicles,
        Permission::DeleteVehicles,
        Permission::ViewUsers,
        Permission::ManageUsers,
        Permission::ManageSubscription,
        Permission::ViewAnalytics,
        Permission::ManageTenants,
        Permission::ManagePlans,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewVehicles => "view vehicles",
            Permission::CreateVehicles => "create vehicles",
            Permission::EditVehicles => "edit vehicles",
            Permission::DeleteVehicles => "delete vehicles",
            Permission::ViewUsers => "view users",
            Permission::ManageUsers => "manage users",
            Permission::ManageSubscription => "manage subscription",
            Permission::ViewAnalytics => "view analytics",
            Permission::ManageTenants => "manage tenants",
            Permission::ManagePlans => "manage plans",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("permission", s))
    }
}

/// Checks that the user holds a permission
pub fn require_permission(auth: &AuthContext, permission: Permission) -> Result<(), AuthzError> {
    if !auth.has_permission(permission) {
        return Err(AuthzError::MissingPermission(permission));
    }

    Ok(())
}

/// Returns the user's tenant, rejecting internal staff
pub fn require_tenant(auth: &AuthContext) -> Result<Uuid, AuthzError> {
    match auth.tenant_id {
        Some(tenant_id) if !auth.is_internal => Ok(tenant_id),
        _ => Err(AuthzError::TenantRequired),
    }
}

/// Checks that the user is internal staff holding a permission
pub fn require_internal(auth: &AuthContext, permission: Permission) -> Result<(), AuthzError> {
    if !auth.is_internal {
        return Err(AuthzError::InternalOnly);
    }

    require_permission(auth, permission)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(permissions: &[Permission]) -> AuthContext {
        AuthContext::new(
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            false,
            permissions.iter().map(|p| p.as_str().to_string()),
        )
    }

    fn staff(permissions: &[Permission]) -> AuthContext {
        AuthContext::new(
            Uuid::new_v4(),
            None,
            true,
            permissions.iter().map(|p| p.as_str().to_string()),
        )
    }

    #[test]
    fn test_permission_names_roundtrip() {
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), permission);
        }
        assert!("fly vehicles".parse::<Permission>().is_err());
        assert_eq!(Permission::ManagePlans.to_string(), "manage plans");
    }

    #[test]
    fn test_require_permission() {
        let auth = member(&[Permission::ViewVehicles]);

        assert!(require_permission(&auth, Permission::ViewVehicles).is_ok());
        assert_eq!(
            require_permission(&auth, Permission::DeleteVehicles),
            Err(AuthzError::MissingPermission(Permission::DeleteVehicles))
        );
    }

    #[test]
    fn test_require_tenant() {
        let auth = member(&[]);
        assert_eq!(require_tenant(&auth), Ok(auth.tenant_id.unwrap()));

        assert_eq!(require_tenant(&staff(&[])), Err(AuthzError::TenantRequired));
    }

    #[test]
    fn test_require_internal() {
        let analyst = staff(&[Permission::ViewAnalytics]);
        assert!(require_internal(&analyst, Permission::ViewAnalytics).is_ok());
        assert_eq!(
            require_internal(&analyst, Permission::ManageTenants),
            Err(AuthzError::MissingPermission(Permission::ManageTenants))
        );

        // A tenant member holding the permission name still isn't staff
        let impostor = member(&[Permission::ViewAnalytics]);
        assert_eq!(
            require_internal(&impostor, Permission::ViewAnalytics),
            Err(AuthzError::InternalOnly)
        );
    }

    #[test]
    fn test_authz_error_display() {
        let err = AuthzError::MissingPermission(Permission::ManageUsers);
        assert_eq!(err.to_string(), "Missing permission: manage users");
        assert!(AuthzError::TenantRequired.to_string().contains("tenant"));
    }
}
