//! Staff accounts against a real database
//!
//! Needs PostgreSQL through `DATABASE_URL`; without it every test returns
//! early.

use flotteq_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{create_pool, DatabaseConfig},
    },
    models::{
        role::Role,
        tenant::{CreateTenant, Tenant},
        user::{CreateUser, User},
    },
};
use flotteq_worker::staff::{create_staff, StaffError, StaffOutcome, StaffRole};
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

#[tokio::test]
async fn test_super_admin_has_no_tenant_and_back_office_permissions() {
    let Some(pool) = pool().await else {
        return;
    };
    let email = format!("Ops-{}@FlotteQ.test", Uuid::new_v4());

    let outcome = create_staff(&pool, &email, "Flotte2024secure", StaffRole::SuperAdmin)
        .await
        .unwrap();
    let StaffOutcome::Created { user_id } = outcome else {
        panic!("expected a new staff user, got {:?}", outcome);
    };

    let user = User::find_by_id(&pool, user_id).await.unwrap().unwrap();
    assert!(user.is_internal);
    assert!(user.tenant_id.is_none());
    assert_eq!(user.email, email.to_lowercase());

    let permissions = Role::permissions_for_user(&pool, user_id).await.unwrap();
    for expected in ["manage tenants", "manage plans", "view analytics"] {
        assert!(permissions.iter().any(|p| p == expected), "missing {}", expected);
    }
    assert!(!permissions.iter().any(|p| p == "view vehicles"));
}

#[tokio::test]
async fn test_running_twice_grants_the_extra_role() {
    let Some(pool) = pool().await else {
        return;
    };
    let email = format!("support-{}@flotteq.test", Uuid::new_v4());

    let first = create_staff(&pool, &email, "Flotte2024secure", StaffRole::Support)
        .await
        .unwrap();
    let StaffOutcome::Created { user_id } = first else {
        panic!("expected a new staff user, got {:?}", first);
    };

    let second = create_staff(&pool, &email, "Flotte2024secure", StaffRole::SuperAdmin)
        .await
        .unwrap();
    assert_eq!(second, StaffOutcome::RoleGranted { user_id });

    let names: Vec<String> = Role::list_for_user(&pool, user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["super_admin".to_string(), "support".to_string()]);
}

#[tokio::test]
async fn test_tenant_user_cannot_become_staff() {
    let Some(pool) = pool().await else {
        return;
    };
    let tenant = Tenant::create(
        &pool,
        CreateTenant {
            name: format!("Flotte {}", Uuid::new_v4()),
            contact_email: None,
            phone: None,
            address: None,
        },
    )
    .await
    .unwrap();
    let member = User::create(
        &pool,
        CreateUser {
            tenant_id: Some(tenant.id),
            email: format!("member-{}@flotte.test", Uuid::new_v4()),
            password_hash: None,
            first_name: None,
            last_name: None,
            phone: None,
            google_id: None,
            is_internal: false,
        },
    )
    .await
    .unwrap();

    let result = create_staff(&pool, &member.email, "Flotte2024secure", StaffRole::Support).await;
    assert!(matches!(result, Err(StaffError::TenantMember(_))));
    assert!(Role::list_for_user(&pool, member.id).await.unwrap().is_empty());
}
