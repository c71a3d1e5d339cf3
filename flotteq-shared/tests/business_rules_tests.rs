//! End-to-end checks of the quota gate, tenant isolation, the
//! one-active-subscription rule and the sweep queries
//!
//! Run with `DATABASE_URL` set: cargo test -p flotteq-shared --test business_rules_tests

mod common;

use chrono::{Duration, Utc};
use flotteq_shared::models::inspection::{CreateInspection, InspectionResult, TechnicalInspection};
use flotteq_shared::models::subscription::UserSubscription;
use flotteq_shared::models::vehicle::Vehicle;
use flotteq_shared::quota::{create_vehicle_within_quota, QuotaEnforcer, QuotaError};

#[tokio::test]
async fn test_two_free_vehicles_then_subscription_required() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let user = common::create_member(&pool, tenant.id, "driver").await;

    for _ in 0..2 {
        create_vehicle_within_quota(&pool, common::new_vehicle(tenant.id, user.id))
            .await
            .expect("Free vehicles should be allowed");
    }

    let err = create_vehicle_within_quota(&pool, common::new_vehicle(tenant.id, user.id))
        .await
        .unwrap_err();
    assert!(matches!(err, QuotaError::SubscriptionRequired { current: 2, .. }));

    assert_eq!(Vehicle::count_by_user(&pool, user.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_plan_allows_n_and_blocks_n_plus_one() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let user = common::create_member(&pool, tenant.id, "driver").await;
    let plan = common::create_plan(&pool, 4).await;

    UserSubscription::subscribe(&pool, user.id, &plan).await.unwrap();

    for _ in 0..4 {
        create_vehicle_within_quota(&pool, common::new_vehicle(tenant.id, user.id))
            .await
            .expect("Vehicles within the plan should be allowed");
    }

    let err = create_vehicle_within_quota(&pool, common::new_vehicle(tenant.id, user.id))
        .await
        .unwrap_err();
    assert!(matches!(err, QuotaError::LimitExceeded { current: 4, limit: 4 }));

    let usage = QuotaEnforcer::new(pool.clone()).usage(user.id).await.unwrap();
    assert_eq!(usage.current, 4);
    assert_eq!(usage.remaining, 0);
    assert!(usage.at_limit);
    assert_eq!(usage.plan_name.as_deref(), Some(plan.name.as_str()));
}

#[tokio::test]
async fn test_concurrent_creations_cannot_exceed_quota() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let user = common::create_member(&pool, tenant.id, "driver").await;

    let attempts = (0..5).map(|_| {
        let pool = pool.clone();
        let data = common::new_vehicle(tenant.id, user.id);
        tokio::spawn(async move { create_vehicle_within_quota(&pool, data).await })
    });

    let mut created = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        if attempt.await.unwrap().is_ok() {
            created += 1;
        }
    }

    assert_eq!(created, 2);
    assert_eq!(Vehicle::count_by_user(&pool, user.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_vehicle_lookup_is_tenant_scoped() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant_a = common::create_tenant(&pool).await;
    let tenant_b = common::create_tenant(&pool).await;
    let owner = common::create_member(&pool, tenant_a.id, "driver").await;

    let vehicle = create_vehicle_within_quota(&pool, common::new_vehicle(tenant_a.id, owner.id))
        .await
        .unwrap();

    assert!(Vehicle::find_in_tenant(&pool, tenant_a.id, vehicle.id).await.unwrap().is_some());
    assert!(Vehicle::find_in_tenant(&pool, tenant_b.id, vehicle.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_subscribe_keeps_one_active_enrollment() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let user = common::create_member(&pool, tenant.id, "admin").await;
    let small = common::create_plan(&pool, 5).await;
    let large = common::create_plan(&pool, 25).await;

    let first = UserSubscription::subscribe(&pool, user.id, &small).await.unwrap();
    let second = UserSubscription::subscribe(&pool, user.id, &large).await.unwrap();

    let history = UserSubscription::list_for_user(&pool, user.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|s| s.is_active).count(), 1);
    assert!(history.iter().any(|s| s.id == first.id && !s.is_active && s.cancelled_at.is_some()));

    let current = UserSubscription::find_current(&pool, user.id, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.id, second.id);
    assert_eq!(current.max_vehicles, 25);

    let cancelled = UserSubscription::cancel(&pool, user.id).await.unwrap();
    assert_eq!(cancelled.map(|s| s.id), Some(second.id));
    assert!(UserSubscription::find_current(&pool, user.id, Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_expire_overdue_flips_each_row_once() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let user = common::create_member(&pool, tenant.id, "driver").await;
    let plan = common::create_plan(&pool, 5).await;

    let enrollment = UserSubscription::subscribe(&pool, user.id, &plan).await.unwrap();

    // Nothing is overdue yet
    let expired = UserSubscription::expire_overdue(&pool, Utc::now()).await.unwrap();
    assert!(expired.iter().all(|e| e.user_id != user.id));

    // Sweep as if run after the end date
    let later = enrollment.end_date + Duration::days(1);
    let expired = UserSubscription::expire_overdue(&pool, later).await.unwrap();
    let mine: Vec<_> = expired.iter().filter(|e| e.user_id == user.id).collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].email, user.email);
    assert_eq!(mine[0].plan_name, plan.name);

    // A second pass finds nothing left to flip
    let again = UserSubscription::expire_overdue(&pool, later).await.unwrap();
    assert!(again.iter().all(|e| e.user_id != user.id));
}

#[tokio::test]
async fn test_due_inspections_use_latest_record_and_dedupe_per_day() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let tenant = common::create_tenant(&pool).await;
    let owner = common::create_member(&pool, tenant.id, "driver").await;
    let vehicle = create_vehicle_within_quota(&pool, common::new_vehicle(tenant.id, owner.id))
        .await
        .unwrap();

    let today = Utc::now().date_naive();

    // An old inspection whose due date is inside the window...
    TechnicalInspection::create(
        &pool,
        CreateInspection {
            vehicle_id: vehicle.id,
            tenant_id: tenant.id,
            inspected_on: today - Duration::days(730),
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

    // ...superseded by a recent one due in 20 days
    let latest = TechnicalInspection::create(
        &pool,
        CreateInspection {
            vehicle_id: vehicle.id,
            tenant_id: tenant.id,
            inspected_on: today - Duration::days(10),
            next_due_date: today + Duration::days(20),
            result: InspectionResult::ContreVisite,
            center: Some("Autosur Lyon 7".to_string()),
            mileage: None,
            cost_cents: Some(7_800),
            notes: None,
        },
    )
    .await
    .unwrap();

    let due = TechnicalInspection::due_within(&pool, today, 30).await.unwrap();
    let mine: Vec<_> = due.iter().filter(|d| d.vehicle_id == vehicle.id).collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].inspection_id, latest.id);
    assert_eq!(mine[0].owner_email, owner.email);
    assert_eq!(mine[0].days_left(today), 20);

    assert!(TechnicalInspection::mark_reminded(&pool, latest.id, today).await.unwrap());

    let due = TechnicalInspection::due_within(&pool, today, 30).await.unwrap();
    assert!(due.iter().all(|d| d.vehicle_id != vehicle.id));

    // Tomorrow it is due again
    let tomorrow = today + Duration::days(1);
    let due = TechnicalInspection::due_within(&pool, tomorrow, 30).await.unwrap();
    assert!(due.iter().any(|d| d.vehicle_id == vehicle.id));
}
