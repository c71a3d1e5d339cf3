//! Sweeps against a real database
//!
//! Needs PostgreSQL through `DATABASE_URL`; without it every test returns
//! early. Other tests may share the database, so assertions only look at
//! rows these tests created.

use chrono::{Duration, Utc};
use flotteq_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{create_pool, DatabaseConfig},
    },
    models::{
        inspection::{CreateInspection, InspectionResult, TechnicalInspection},
        subscription::{BillingInterval, CreateSubscription, Subscription, UserSubscription},
        tenant::{CreateTenant, Tenant},
        user::{CreateUser, User},
        vehicle::{CreateVehicle, FuelType, Vehicle},
    },
};
use flotteq_worker::{
    jobs::{expire_subscriptions, remind_inspections},
    notify::{MemoryNotifier, Notification},
};
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Some(url) = std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()) else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    ensure_database_exists(&url).await.unwrap();
    let pool = create_pool(DatabaseConfig::from_url(url).with_max_connections(5))
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    Some(pool)
}

async fn owner(pool: &PgPool) -> User {
    let tenant = Tenant::create(
        pool,
        CreateTenant {
            name: format!("Flotte {}", Uuid::new_v4()),
            contact_email: None,
            phone: None,
            address: None,
        },
    )
    .await
    .unwrap();

    User::create(
        pool,
        CreateUser {
            tenant_id: Some(tenant.id),
            email: format!("owner-{}@flotte.test", Uuid::new_v4()),
            password_hash: None,
            first_name: Some("Julien".to_string()),
            last_name: None,
            phone: None,
            google_id: None,
            is_internal: false,
        },
    )
    .await
    .unwrap()
}

fn mine<'a>(sent: &'a [Notification], user: &User) -> Vec<&'a Notification> {
    sent.iter().filter(|n| n.recipient() == user.email).collect()
}

#[tokio::test]
async fn test_expiration_deactivates_and_notifies_once() {
    let Some(pool) = pool().await else {
        return;
    };
    let user = owner(&pool).await;

    let plan = Subscription::create(
        &pool,
        CreateSubscription {
            name: format!("Test {}", Uuid::new_v4()),
            description: None,
            price_cents: 1_900,
            currency: "EUR".to_string(),
            billing_interval: BillingInterval::Monthly,
            max_vehicles: 5,
        },
    )
    .await
    .unwrap();

    let enrollment = UserSubscription::subscribe(&pool, user.id, &plan).await.unwrap();
    sqlx::query("UPDATE user_subscriptions SET end_date = NOW() - INTERVAL '1 day' WHERE id = $1")
        .bind(enrollment.id)
        .execute(&pool)
        .await
        .unwrap();

    let notifier = MemoryNotifier::new();
    expire_subscriptions(&pool, &notifier, Utc::now()).await.unwrap();

    let sent = notifier.sent();
    assert_eq!(mine(&sent, &user).len(), 1);
    assert!(UserSubscription::find_current(&pool, user.id, Utc::now())
        .await
        .unwrap()
        .is_none());

    let again = MemoryNotifier::new();
    expire_subscriptions(&pool, &again, Utc::now()).await.unwrap();
    assert!(mine(&again.sent(), &user).is_empty());
}

#[tokio::test]
async fn test_inspection_reminder_goes_to_owner_once_a_day() {
    let Some(pool) = pool().await else {
        return;
    };
    let user = owner(&pool).await;
    let today = Utc::now().date_naive();

    let vehicle = Vehicle::create(
        &pool,
        CreateVehicle {
            tenant_id: user.tenant_id.unwrap(),
            user_id: user.id,
            plate: format!("T-{}", &Uuid::new_v4().simple().to_string()[..8]),
            vin: None,
            brand: "Citroën".to_string(),
            model: "Berlingo".to_string(),
            year: Some(2019),
            fuel_type: FuelType::Diesel,
            mileage: 98_000,
            color: None,
            purchase_date: None,
            purchase_price_cents: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    TechnicalInspection::create(
        &pool,
        CreateInspection {
            vehicle_id: vehicle.id,
            tenant_id: vehicle.tenant_id,
            inspected_on: today - Duration::days(700),
            next_due_date: today + Duration::days(5),
            result: InspectionResult::Favorable,
            center: None,
            mileage: None,
            cost_cents: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    let notifier = MemoryNotifier::new();
    remind_inspections(&pool, &notifier, today, 30).await.unwrap();

    let sent = notifier.sent();
    let reminders = mine(&sent, &user);
    assert_eq!(reminders.len(), 1);
    match reminders[0] {
        Notification::InspectionDue { plate, days_left, .. } => {
            assert_eq!(plate, &vehicle.plate);
            assert_eq!(*days_left, 5);
        }
        other => panic!("unexpected notification {:?}", other),
    }

    let again = MemoryNotifier::new();
    remind_inspections(&pool, &again, today, 30).await.unwrap();
    assert!(mine(&again.sent(), &user).is_empty());
}

#[tokio::test]
async fn test_failed_reminder_is_retried() {
    let Some(pool) = pool().await else {
        return;
    };
    let user = owner(&pool).await;
    let today = Utc::now().date_naive();

    let vehicle = Vehicle::create(
        &pool,
        CreateVehicle {
            tenant_id: user.tenant_id.unwrap(),
            user_id: user.id,
            plate: format!("T-{}", &Uuid::new_v4().simple().to_string()[..8]),
            vin: None,
            brand: "Ford".to_string(),
            model: "Transit".to_string(),
            year: None,
            fuel_type: FuelType::Diesel,
            mileage: 0,
            color: None,
            purchase_date: None,
            purchase_price_cents: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    TechnicalInspection::create(
        &pool,
        CreateInspection {
            vehicle_id: vehicle.id,
            tenant_id: vehicle.tenant_id,
            inspected_on: today - Duration::days(700),
            next_due_date: today + Duration::days(2),
            result: InspectionResult::Favorable,
            center: None,
            mileage: None,
            cost_cents: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    let failing = MemoryNotifier::failing_for([user.email.clone()]);
    remind_inspections(&pool, &failing, today, 30).await.unwrap();

    let notifier = MemoryNotifier::new();
    remind_inspections(&pool, &notifier, today, 30).await.unwrap();
    assert_eq!(mine(&notifier.sent(), &user).len(), 1);
}
