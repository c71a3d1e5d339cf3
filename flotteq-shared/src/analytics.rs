/// Platform statistics for internal staff
///
/// Read-only aggregates across all tenants, served by the back-office
/// analytics routes. Revenue figures are normalised to one month: a yearly
/// plan contributes a twelfth of its price.

use crate::models::inspection::TechnicalInspection;
use crate::models::subscription::BillingInterval;
use crate::models::tenant::{Tenant, TenantSummary};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Window of the "inspections due soon" counter
pub const INSPECTION_WINDOW_DAYS: i64 = 30;

/// Window of the "subscriptions expiring soon" counter
pub const EXPIRY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct PlatformOverview {
    pub tenants: i64,
    pub active_tenants: i64,
    pub users: i64,
    pub vehicles: i64,
    pub active_subscriptions: i64,
    pub monthly_recurring_revenue_cents: i64,
    pub inspections_due_soon: i64,
    pub subscriptions_expiring_soon: i64,
    pub generated_at: DateTime<Utc>,
}

/// Subscribers and revenue of one plan
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PlanRevenue {
    pub plan_id: Uuid,
    pub plan_name: String,

    #[sqlx(try_from = "String")]
    pub billing_interval: BillingInterval,

    pub price_cents: i64,

    /// Users whose current subscription is this plan
    pub subscribers: i64,
}

impl PlanRevenue {
    pub fn monthly_revenue_cents(&self) -> i64 {
        self.price_cents * self.subscribers / i64::from(self.billing_interval.months())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    pub plans: Vec<PlanRevenue>,
    pub monthly_recurring_revenue_cents: i64,
}

/// Sum of the monthly revenue of every plan
pub fn monthly_recurring_revenue(plans: &[PlanRevenue]) -> i64 {
    plans.iter().map(PlanRevenue::monthly_revenue_cents).sum()
}

/// Per-plan subscriber counts at `now`
pub async fn revenue_by_plan(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<PlanRevenue>, sqlx::Error> {
    sqlx::query_as::<_, PlanRevenue>(
        r#"
        SELECT s.id AS plan_id, s.name AS plan_name, s.billing_interval, s.price_cents,
               COUNT(us.id) AS subscribers
        FROM subscriptions s
        LEFT JOIN user_subscriptions us
               ON us.subscription_id = s.id AND us.is_active AND us.end_date > $1
        GROUP BY s.id, s.name, s.billing_interval, s.price_cents
        ORDER BY s.price_cents, s.name
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

pub async fn revenue_report(pool: &PgPool, now: DateTime<Utc>) -> Result<RevenueReport, sqlx::Error> {
    let plans = revenue_by_plan(pool, now).await?;
    let monthly_recurring_revenue_cents = monthly_recurring_revenue(&plans);

    Ok(RevenueReport {
        plans,
        monthly_recurring_revenue_cents,
    })
}

/// Headline counters for the back-office dashboard
pub async fn overview(pool: &PgPool, now: DateTime<Utc>) -> Result<PlatformOverview, sqlx::Error> {
    let (tenants, active_tenants, users, vehicles): (i64, i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT (SELECT COUNT(*) FROM tenants),
               (SELECT COUNT(*) FROM tenants WHERE is_active),
               (SELECT COUNT(*) FROM users WHERE NOT is_internal),
               (SELECT COUNT(*) FROM vehicles)
        "#,
    )
    .fetch_one(pool)
    .await?;

    let (active_subscriptions, expiring_soon): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FILTER (WHERE end_date > $1),
               COUNT(*) FILTER (WHERE end_date > $1 AND end_date <= $2)
        FROM user_subscriptions
        WHERE is_active
        "#,
    )
    .bind(now)
    .bind(now + Duration::days(EXPIRY_WINDOW_DAYS))
    .fetch_one(pool)
    .await?;

    let plans = revenue_by_plan(pool, now).await?;
    let inspections_due_soon =
        TechnicalInspection::count_due_within(pool, now.date_naive(), INSPECTION_WINDOW_DAYS).await?;

    Ok(PlatformOverview {
        tenants,
        active_tenants,
        users,
        vehicles,
        active_subscriptions,
        monthly_recurring_revenue_cents: monthly_recurring_revenue(&plans),
        inspections_due_soon,
        subscriptions_expiring_soon: expiring_soon,
        generated_at: now,
    })
}

/// Tenants with their user and vehicle counts
pub async fn tenant_breakdown(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<TenantSummary>, sqlx::Error> {
    Tenant::list_summaries(pool, limit, offset).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(interval: BillingInterval, price_cents: i64, subscribers: i64) -> PlanRevenue {
        PlanRevenue {
            plan_id: Uuid::new_v4(),
            plan_name: "Plan".to_string(),
            billing_interval: interval,
            price_cents,
            subscribers,
        }
    }

    #[test]
    fn test_monthly_revenue_normalises_yearly_plans() {
        assert_eq!(plan(BillingInterval::Monthly, 1_990, 3).monthly_revenue_cents(), 5_970);
        assert_eq!(plan(BillingInterval::Yearly, 48_000, 2).monthly_revenue_cents(), 8_000);
        assert_eq!(plan(BillingInterval::Yearly, 48_000, 0).monthly_revenue_cents(), 0);
    }

    #[test]
    fn test_monthly_recurring_revenue_sums_plans() {
        let plans = vec![
            plan(BillingInterval::Monthly, 1_990, 10),
            plan(BillingInterval::Monthly, 4_990, 4),
            plan(BillingInterval::Yearly, 49_900, 1),
        ];

        assert_eq!(monthly_recurring_revenue(&plans), 19_900 + 19_960 + 4_158);
        assert_eq!(monthly_recurring_revenue(&[]), 0);
    }
}
