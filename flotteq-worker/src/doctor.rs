/// `flotteq-worker doctor`: one-shot diagnostics printed as JSON

use chrono::{DateTime, Utc};
use flotteq_shared::{
    db::{
        migrations::{get_migration_status, MigrationStatus},
        pool::{get_pool_stats, health_check, PoolStats},
    },
    models::{inspection::TechnicalInspection, tenant::Tenant, user::User, vehicle::Vehicle},
};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub checked_at: DateTime<Utc>,
    pub version: &'static str,
    pub database_ok: bool,
    pub migrations: Option<MigrationStatus>,
    pub pool: PoolStats,
    pub counts: Option<Counts>,
    pub problems: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Counts {
    pub tenants: i64,
    pub users: i64,
    pub vehicles: i64,
    pub inspections_due: i64,
}

impl DoctorReport {
    /// Healthy when the database answers and the schema is current
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Collects the report; failures are recorded as problems, not returned
pub async fn diagnose(pool: &PgPool, reminder_window_days: i64) -> DoctorReport {
    let now = Utc::now();
    let mut problems = Vec::new();

    let database_ok = match health_check(pool).await {
        Ok(()) => true,
        Err(e) => {
            problems.push(format!("database unreachable: {}", e));
            false
        }
    };

    let mut migrations = None;
    let mut counts = None;

    if database_ok {
        match get_migration_status(pool).await {
            Ok(status) => {
                if !status.is_up_to_date {
                    problems.push("pending migrations".to_string());
                }
                migrations = Some(status);
            }
            Err(e) => problems.push(format!("migration status unavailable: {}", e)),
        }

        match collect_counts(pool, now, reminder_window_days).await {
            Ok(c) => counts = Some(c),
            Err(e) => problems.push(format!("counts unavailable: {}", e)),
        }
    }

    DoctorReport {
        checked_at: now,
        version: env!("CARGO_PKG_VERSION"),
        database_ok,
        migrations,
        pool: get_pool_stats(pool),
        counts,
        problems,
    }
}

async fn collect_counts(
    pool: &PgPool,
    now: DateTime<Utc>,
    reminder_window_days: i64,
) -> Result<Counts, sqlx::Error> {
    Ok(Counts {
        tenants: Tenant::count(pool).await?,
        users: User::count(pool).await?,
        vehicles: Vehicle::count(pool).await?,
        inspections_due: TechnicalInspection::count_due_within(
            pool,
            now.date_naive(),
            reminder_window_days,
        )
        .await?,
    })
}
