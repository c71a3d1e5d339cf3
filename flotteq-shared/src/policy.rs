/// Tenant and ownership gate for vehicles and their records
///
/// A tenant member may act on a vehicle only if all of the following hold:
///
/// - they hold the permission for the action
/// - the vehicle belongs to their tenant
/// - they own the vehicle
///
/// Maintenances, replaced parts, invoices, inspections and photos have no
/// policy of their own: they authorize through the parent vehicle, with
/// [`VehicleAction::View`] for reads and [`VehicleAction::Update`] for writes.
///
/// # Existence hiding
///
/// A vehicle of another tenant is reported as [`PolicyDenial::NotFound`], the
/// same as a vehicle that doesn't exist, so ids can't be probed across
/// tenants. Inside the tenant, a vehicle owned by a colleague or a missing
/// permission yields [`PolicyDenial::Forbidden`].
///
/// # Example
///
/// ```no_run
/// use flotteq_shared::policy::{VehicleAction, VehiclePolicy};
/// use flotteq_shared::auth::middleware::AuthContext;
/// use flotteq_shared::models::vehicle::Vehicle;
///
/// fn can_edit(auth: &AuthContext, vehicle: &Vehicle) -> bool {
///     VehiclePolicy::authorize(auth, vehicle, VehicleAction::Update).is_ok()
/// }
/// ```

use crate::auth::authorization::Permission;
use crate::auth::middleware::AuthContext;
use crate::models::vehicle::Vehicle;

/// Something a user wants to do with a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleAction {
    /// Read the vehicle or any of its records
    View,

    /// Add a vehicle to the fleet
    Create,

    /// Modify the vehicle or add/modify/remove its records
    Update,

    /// Remove the vehicle and everything attached to it
    Delete,
}

impl VehicleAction {
    /// Permission required for the action
    pub fn permission(&self) -> Permission {
        match self {
            VehicleAction::View => Permission::ViewVehicles,
            VehicleAction::Create => Permission::CreateVehicles,
            VehicleAction::Update => Permission::EditVehicles,
            VehicleAction::Delete => Permission::DeleteVehicles,
        }
    }
}

/// Why the gate refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyDenial {
    /// Vehicle is outside the user's tenant (or the user is staff)
    #[error("Vehicle not found")]
    NotFound,

    /// Inside the tenant, but not allowed
    #[error("You are not allowed to {action} this vehicle")]
    Forbidden { action: &'static str },
}

/// The vehicle authorization gate
pub struct VehiclePolicy;

impl VehiclePolicy {
    /// Authorizes an action on an existing vehicle
    ///
    /// `Create` is checked against the vehicle's tenant and owner too; for a
    /// vehicle that doesn't exist yet use [`VehiclePolicy::authorize_create`].
    pub fn authorize(
        auth: &AuthContext,
        vehicle: &Vehicle,
        action: VehicleAction,
    ) -> Result<(), PolicyDenial> {
        // Staff carry no tenant and never pass a tenant-scoped check
        let same_tenant = !auth.is_internal && auth.tenant_id == Some(vehicle.tenant_id);
        if !same_tenant {
            return Err(PolicyDenial::NotFound);
        }

        if !auth.has_permission(action.permission()) || vehicle.user_id != auth.user_id {
            return Err(PolicyDenial::Forbidden {
                action: Self::verb(action),
            });
        }

        Ok(())
    }

    /// Authorizes adding a vehicle to the caller's own fleet
    pub fn authorize_create(auth: &AuthContext) -> Result<(), PolicyDenial> {
        if auth.is_internal || auth.tenant_id.is_none() {
            return Err(PolicyDenial::Forbidden { action: "create" });
        }

        if !auth.has_permission(Permission::CreateVehicles) {
            return Err(PolicyDenial::Forbidden { action: "create" });
        }

        Ok(())
    }

    fn verb(action: VehicleAction) -> &'static str {
        match action {
            VehicleAction::View => "view",
            VehicleAction::Create => "create",
            VehicleAction::Update => "update",
            VehicleAction::Delete => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vehicle::{FuelType, VehicleStatus};
    use chrono::Utc;
    use uuid::Uuid;

    const ALL_VEHICLE_PERMISSIONS: [Permission; 4] = [
        Permission::ViewVehicles,
        Permission::CreateVehicles,
        Permission::EditVehicles,
        Permission::DeleteVehicles,
    ];

    fn auth(tenant_id: Option<Uuid>, permissions: &[Permission]) -> AuthContext {
        AuthContext::new(
            Uuid::new_v4(),
            tenant_id,
            tenant_id.is_none(),
            permissions.iter().map(|p| p.as_str().to_string()),
        )
    }

    fn vehicle_of(owner: &AuthContext, tenant_id: Uuid) -> Vehicle {
        Vehicle {
            id: Uuid::new_v4(),
            tenant_id,
            user_id: owner.user_id,
            plate: "AB-123-CD".to_string(),
            vin: None,
            brand: "Peugeot".to_string(),
            model: "Partner".to_string(),
            year: Some(2020),
            fuel_type: FuelType::Diesel,
            mileage: 80_000,
            color: None,
            status: VehicleStatus::Active,
            purchase_date: None,
            purchase_price_cents: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_with_permissions_is_allowed() {
        let tenant = Uuid::new_v4();
        let owner = auth(Some(tenant), &ALL_VEHICLE_PERMISSIONS);
        let vehicle = vehicle_of(&owner, tenant);

        for action in [VehicleAction::View, VehicleAction::Update, VehicleAction::Delete] {
            assert_eq!(VehiclePolicy::authorize(&owner, &vehicle, action), Ok(()));
        }
    }

    #[test]
    fn test_other_tenant_sees_not_found_even_with_permissions() {
        let owner = auth(Some(Uuid::new_v4()), &ALL_VEHICLE_PERMISSIONS);
        let vehicle = vehicle_of(&owner, owner.tenant_id.unwrap());

        let mut intruder = auth(Some(Uuid::new_v4()), &ALL_VEHICLE_PERMISSIONS);
        // Even a forged context reusing the owner's user id stays out
        intruder.user_id = owner.user_id;

        for action in [VehicleAction::View, VehicleAction::Update, VehicleAction::Delete] {
            assert_eq!(
                VehiclePolicy::authorize(&intruder, &vehicle, action),
                Err(PolicyDenial::NotFound)
            );
        }
    }

    #[test]
    fn test_colleague_in_same_tenant_is_forbidden() {
        let tenant = Uuid::new_v4();
        let owner = auth(Some(tenant), &ALL_VEHICLE_PERMISSIONS);
        let colleague = auth(Some(tenant), &ALL_VEHICLE_PERMISSIONS);
        let vehicle = vehicle_of(&owner, tenant);

        assert_eq!(
            VehiclePolicy::authorize(&colleague, &vehicle, VehicleAction::View),
            Err(PolicyDenial::Forbidden { action: "view" })
        );
    }

    #[test]
    fn test_missing_permission_is_forbidden() {
        let tenant = Uuid::new_v4();
        let owner = auth(Some(tenant), &[Permission::ViewVehicles]);
        let vehicle = vehicle_of(&owner, tenant);

        assert!(VehiclePolicy::authorize(&owner, &vehicle, VehicleAction::View).is_ok());
        assert_eq!(
            VehiclePolicy::authorize(&owner, &vehicle, VehicleAction::Delete),
            Err(PolicyDenial::Forbidden { action: "delete" })
        );
    }

    #[test]
    fn test_staff_never_pass_tenant_scoped_checks() {
        let tenant = Uuid::new_v4();
        let owner = auth(Some(tenant), &ALL_VEHICLE_PERMISSIONS);
        let vehicle = vehicle_of(&owner, tenant);
        let staff = auth(None, &ALL_VEHICLE_PERMISSIONS);

        assert_eq!(
            VehiclePolicy::authorize(&staff, &vehicle, VehicleAction::View),
            Err(PolicyDenial::NotFound)
        );
        assert!(VehiclePolicy::authorize_create(&staff).is_err());
    }

    #[test]
    fn test_authorize_create() {
        let member = auth(Some(Uuid::new_v4()), &[Permission::CreateVehicles]);
        assert!(VehiclePolicy::authorize_create(&member).is_ok());

        let viewer = auth(Some(Uuid::new_v4()), &[Permission::ViewVehicles]);
        assert_eq!(
            VehiclePolicy::authorize_create(&viewer),
            Err(PolicyDenial::Forbidden { action: "create" })
        );
    }
}
