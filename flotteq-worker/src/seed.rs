/// Demo data for local development
///
/// Creates a "Transports Démo" tenant with an admin, two vehicles and a
/// contrôle technique falling due in ten days, so the reminder sweep has
/// something to send. Running it twice does nothing the second time.

use chrono::{Duration, Utc};
use flotteq_shared::{
    auth::password::{hash_password, PasswordError},
    models::{
        inspection::{CreateInspection, InspectionResult, TechnicalInspection},
        role::{Role, TENANT_ADMIN_ROLE},
        tenant::{CreateTenant, Tenant},
        user::{CreateUser, User},
        vehicle::{CreateVehicle, FuelType},
    },
    quota::{create_vehicle_within_quota, QuotaError},
};
use sqlx::PgPool;
use uuid::Uuid;

pub const DEMO_ADMIN_EMAIL: &str = "admin@demo.flotteq.fr";

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Quota(#[from] QuotaError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("Role '{0}' is missing, run the migrations first")]
    MissingRole(&'static str),
}

#[derive(Debug, PartialEq, Eq)]
pub enum SeedOutcome {
    Created { tenant_id: Uuid, admin_id: Uuid },
    AlreadyPresent { admin_id: Uuid },
}

pub async fn seed_demo(pool: &PgPool, password: &str) -> Result<SeedOutcome, SeedError> {
    if let Some(admin) = User::find_by_email(pool, DEMO_ADMIN_EMAIL).await? {
        return Ok(SeedOutcome::AlreadyPresent { admin_id: admin.id });
    }

    let password_hash = hash_password(password)?;
    let mut tx = pool.begin().await?;

    let tenant = Tenant::create(
        &mut *tx,
        CreateTenant {
            name: "Transports Démo".to_string(),
            contact_email: Some(DEMO_ADMIN_EMAIL.to_string()),
            phone: Some("+33 1 23 45 67 89".to_string()),
            address: Some("12 rue de la Logistique, 69007 Lyon".to_string()),
        },
    )
    .await?;

    let admin = User::create(
        &mut *tx,
        CreateUser {
            tenant_id: Some(tenant.id),
            email: DEMO_ADMIN_EMAIL.to_string(),
            password_hash: Some(password_hash),
            first_name: Some("Camille".to_string()),
            last_name: Some("Durand".to_string()),
            phone: None,
            google_id: None,
            is_internal: false,
        },
    )
    .await?;

    let role = Role::find_by_name(&mut *tx, TENANT_ADMIN_ROLE)
        .await?
        .ok_or(SeedError::MissingRole(TENANT_ADMIN_ROLE))?;
    Role::assign_to_user(&mut *tx, admin.id, role.id).await?;

    tx.commit().await?;

    let kangoo = create_vehicle_within_quota(
        pool,
        demo_vehicle(tenant.id, admin.id, "DM-001-FQ", "Renault", "Kangoo", FuelType::Diesel, 84_000),
    )
    .await?;
    create_vehicle_within_quota(
        pool,
        demo_vehicle(tenant.id, admin.id, "DM-002-FQ", "Peugeot", "e-208", FuelType::Electric, 12_500),
    )
    .await?;

    let today = Utc::now().date_naive();
    TechnicalInspection::create(
        pool,
        CreateInspection {
            vehicle_id: kangoo.id,
            tenant_id: tenant.id,
            inspected_on: today - Duration::days(720),
            next_due_date: today + Duration::days(10),
            result: InspectionResult::Favorable,
            center: Some("Autosur Lyon 7".to_string()),
            mileage: Some(61_000),
            cost_cents: Some(7_900),
            notes: None,
        },
    )
    .await?;

    tracing::info!(tenant_id = %tenant.id, admin_id = %admin.id, "Demo data created");

    Ok(SeedOutcome::Created {
        tenant_id: tenant.id,
        admin_id: admin.id,
    })
}

fn demo_vehicle(
    tenant_id: Uuid,
    user_id: Uuid,
    plate: &str,
    brand: &str,
    model: &str,
    fuel_type: FuelType,
    mileage: i32,
) -> CreateVehicle {
    CreateVehicle {
        tenant_id,
        user_id,
        plate: plate.to_string(),
        vin: None,
        brand: brand.to_string(),
        model: model.to_string(),
        year: Some(2021),
        fuel_type,
        mileage,
        color: None,
        purchase_date: None,
        purchase_price_cents: None,
        notes: None,
    }
}
