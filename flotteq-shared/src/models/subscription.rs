/// Subscription plans and user enrollments
///
/// A [`Subscription`] is a plan from the catalog (price, billing interval,
/// vehicle allowance). A [`UserSubscription`] enrolls one user in one plan for
/// a time window.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subscriptions (
///     id UUID PRIMARY KEY,
///     name VARCHAR(100) NOT NULL UNIQUE,
///     description TEXT,
///     price_cents BIGINT NOT NULL,
///     currency VARCHAR(3) NOT NULL DEFAULT 'EUR',
///     billing_interval VARCHAR(20) NOT NULL,   -- 'monthly' | 'yearly'
///     max_vehicles INTEGER NOT NULL CHECK (max_vehicles > 0),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     ...
/// );
///
/// CREATE TABLE user_subscriptions (
///     id UUID PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     subscription_id UUID NOT NULL REFERENCES subscriptions(id),
///     start_date TIMESTAMPTZ NOT NULL,
///     end_date TIMESTAMPTZ NOT NULL,
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     cancelled_at TIMESTAMPTZ,
///     ...
/// );
///
/// CREATE UNIQUE INDEX user_subscriptions_one_active_idx
///     ON user_subscriptions(user_id) WHERE is_active;
/// ```
///
/// # Active enrollment
///
/// A user has at most one row with `is_active = true` (partial unique index).
/// That row only counts as *current* while `end_date` is in the future; the
/// daily expiration sweep flips overdue rows to inactive with
/// [`UserSubscription::expire_overdue`].
///
/// # Example
///
/// ```no_run
/// use flotteq_shared::models::subscription::{Subscription, UserSubscription};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let plans = Subscription::list_active(&pool).await?;
/// let plan = &plans[0];
///
/// UserSubscription::subscribe(&pool, user_id, plan).await?;
///
/// let current = UserSubscription::find_current(&pool, user_id, chrono::Utc::now()).await?;
/// assert_eq!(current.map(|c| c.max_vehicles), Some(plan.max_vehicles));
/// # Ok(())
/// # }
/// ```

use super::UnknownVariant;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::str::FromStr;
use uuid::Uuid;

const PLAN_COLUMNS: &str = "id, name, description, price_cents, currency, billing_interval, \
     max_vehicles, is_active, created_at, updated_at";

const ENROLLMENT_COLUMNS: &str =
    "id, user_id, subscription_id, start_date, end_date, is_active, cancelled_at, created_at, updated_at";

/// How often a plan is billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
        }
    }

    /// Number of months covered by one billing period
    pub fn months(&self) -> u32 {
        match self {
            BillingInterval::Monthly => 1,
            BillingInterval::Yearly => 12,
        }
    }

    /// End of the billing period starting at `start`
    ///
    /// Month arithmetic clamps to the last day of shorter months
    /// (31 January + 1 month = 28/29 February).
    pub fn period_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start
            .checked_add_months(Months::new(self.months()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl FromStr for BillingInterval {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingInterval::Monthly),
            "yearly" => Ok(BillingInterval::Yearly),
            other => Err(UnknownVariant::new("billing interval", other)),
        }
    }
}

impl TryFrom<String> for BillingInterval {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A plan from the catalog
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// Price per billing period, in cents
    pub price_cents: i64,

    /// ISO 4217 code
    pub currency: String,

    #[sqlx(try_from = "String")]
    pub billing_interval: BillingInterval,

    /// Number of vehicles a subscriber may own
    pub max_vehicles: i32,

    /// Inactive plans stay attached to existing enrollments but can't be picked
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscription {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub billing_interval: BillingInterval,
    pub max_vehicles: i32,
}

/// Input for updating a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSubscription {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub price_cents: Option<i64>,
    pub max_vehicles: Option<i32>,
    pub is_active: Option<bool>,
}

impl Subscription {
    /// Price normalised to one month, in cents (yearly plans divided by 12)
    pub fn monthly_price_cents(&self) -> i64 {
        self.price_cents / i64::from(self.billing_interval.months())
    }

    pub async fn create(pool: &PgPool, data: CreateSubscription) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO subscriptions (name, description, price_cents, currency, billing_interval, max_vehicles) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PLAN_COLUMNS}"
        );

        sqlx::query_as::<_, Subscription>(&query)
            .bind(data.name)
            .bind(data.description)
            .bind(data.price_cents)
            .bind(data.currency)
            .bind(data.billing_interval.as_str())
            .bind(data.max_vehicles)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {PLAN_COLUMNS} FROM subscriptions WHERE id = $1");

        sqlx::query_as::<_, Subscription>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Plans open for enrollment, cheapest first
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PLAN_COLUMNS} FROM subscriptions WHERE is_active ORDER BY price_cents, name"
        );

        sqlx::query_as::<_, Subscription>(&query).fetch_all(pool).await
    }

    /// Every plan including retired ones
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {PLAN_COLUMNS} FROM subscriptions ORDER BY price_cents, name");

        sqlx::query_as::<_, Subscription>(&query).fetch_all(pool).await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateSubscription,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE subscriptions SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.price_cents.is_some() {
            bind_count += 1;
            query.push_str(&format!(", price_cents = ${}", bind_count));
        }
        if data.max_vehicles.is_some() {
            bind_count += 1;
            query.push_str(&format!(", max_vehicles = ${}", bind_count));
        }
        if data.is_active.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_active = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {PLAN_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Subscription>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(price) = data.price_cents {
            q = q.bind(price);
        }
        if let Some(max) = data.max_vehicles {
            q = q.bind(max);
        }
        if let Some(active) = data.is_active {
            q = q.bind(active);
        }

        q.fetch_optional(pool).await
    }
}

/// A user's enrollment in a plan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,

    /// Set when the user cancelled, or when a newer enrollment replaced this one
    pub cancelled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The enrollment currently driving a user's quota, joined with its plan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CurrentSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub plan_name: String,
    pub max_vehicles: i32,
    pub price_cents: i64,
    pub currency: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// An enrollment flipped inactive by the expiration sweep
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExpiredSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub plan_name: String,
    pub end_date: DateTime<Utc>,
}

impl UserSubscription {
    /// The user's active and un-expired enrollment, if any
    ///
    /// An `is_active` row whose `end_date` has passed doesn't count, even
    /// before the sweep has flipped it.
    pub async fn find_current<'e>(
        executor: impl PgExecutor<'e>,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<CurrentSubscription>, sqlx::Error> {
        sqlx::query_as::<_, CurrentSubscription>(
            r#"
            SELECT us.id, us.user_id, us.subscription_id,
                   s.name AS plan_name, s.max_vehicles, s.price_cents, s.currency,
                   us.start_date, us.end_date
            FROM user_subscriptions us
            JOIN subscriptions s ON s.id = us.subscription_id
            WHERE us.user_id = $1
              AND us.is_active
              AND us.end_date > $2
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Enrolls a user in a plan for one billing period starting now
    ///
    /// Any previously active enrollment is deactivated in the same
    /// transaction, so the one-active-row invariant holds at every commit.
    pub async fn subscribe(
        pool: &PgPool,
        user_id: Uuid,
        plan: &Subscription,
    ) -> Result<Self, sqlx::Error> {
        let start = Utc::now();
        let end = plan.billing_interval.period_end(start);

        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET is_active = FALSE, cancelled_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND is_active
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let query = format!(
            "INSERT INTO user_subscriptions (user_id, subscription_id, start_date, end_date) \
             VALUES ($1, $2, $3, $4) RETURNING {ENROLLMENT_COLUMNS}"
        );

        let enrollment = sqlx::query_as::<_, UserSubscription>(&query)
            .bind(user_id)
            .bind(plan.id)
            .bind(start)
            .bind(end)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(enrollment)
    }

    /// Cancels the user's active enrollment
    ///
    /// # Returns
    ///
    /// The cancelled enrollment, or None if the user had none
    pub async fn cancel(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE user_subscriptions \
             SET is_active = FALSE, cancelled_at = NOW(), updated_at = NOW() \
             WHERE user_id = $1 AND is_active RETURNING {ENROLLMENT_COLUMNS}"
        );

        sqlx::query_as::<_, UserSubscription>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Enrollment history of a user, newest first
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM user_subscriptions WHERE user_id = $1 ORDER BY start_date DESC"
        );

        sqlx::query_as::<_, UserSubscription>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Flips every active enrollment whose `end_date` is before `now`
    ///
    /// The flip is a single `UPDATE ... RETURNING`, so rows are claimed
    /// atomically and a concurrent sweep cannot return the same row twice.
    ///
    /// # Returns
    ///
    /// The flipped enrollments with the owner's contact details
    pub async fn expire_overdue(
        pool: &PgPool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExpiredSubscription>, sqlx::Error> {
        sqlx::query_as::<_, ExpiredSubscription>(
            r#"
            WITH expired AS (
                UPDATE user_subscriptions
                SET is_active = FALSE, updated_at = NOW()
                WHERE is_active AND end_date < $1
                RETURNING id, user_id, subscription_id, end_date
            )
            SELECT e.id, e.user_id, u.email, u.first_name, s.name AS plan_name, e.end_date
            FROM expired e
            JOIN users u ON u.id = e.user_id
            JOIN subscriptions s ON s.id = e.subscription_id
            ORDER BY e.user_id, e.end_date
            "#,
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_billing_interval_parsing() {
        assert_eq!("monthly".parse::<BillingInterval>().unwrap(), BillingInterval::Monthly);
        assert_eq!(BillingInterval::try_from("yearly".to_string()).unwrap(), BillingInterval::Yearly);

        let err = "weekly".parse::<BillingInterval>().unwrap_err();
        assert_eq!(err.to_string(), "unknown billing interval: 'weekly'");
    }

    #[test]
    fn test_period_end_clamps_to_month_end() {
        let start = Utc.with_ymd_and_hms(2025, 1, 31, 10, 0, 0).unwrap();
        let end = BillingInterval::Monthly.period_end(start);
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 2, 28, 10, 0, 0).unwrap());

        let end = BillingInterval::Yearly.period_end(start);
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_monthly_price_normalisation() {
        let plan = Subscription {
            id: Uuid::new_v4(),
            name: "Flotte".to_string(),
            description: None,
            price_cents: 49_900,
            currency: "EUR".to_string(),
            billing_interval: BillingInterval::Yearly,
            max_vehicles: 100,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(plan.monthly_price_cents(), 4_158);

        let monthly = Subscription {
            billing_interval: BillingInterval::Monthly,
            price_cents: 1_990,
            ..plan
        };
        assert_eq!(monthly.monthly_price_cents(), 1_990);
    }
}
