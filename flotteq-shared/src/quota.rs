/// Vehicle quota enforcement
///
/// Every user may own a small number of vehicles for free. Beyond that, the
/// user needs a current subscription (active and not past its end date), and
/// the plan's `max_vehicles` caps the fleet.
///
/// # Rule
///
/// On vehicle creation, with `current` the number of vehicles the user owns:
///
/// 1. `current < FREE_VEHICLE_LIMIT` → allowed, no subscription needed
/// 2. no current subscription → rejected (`SubscriptionRequired`)
/// 3. `current < plan.max_vehicles` → allowed
/// 4. otherwise → rejected (`LimitExceeded`)
///
/// Rejections map to HTTP 403.
///
/// # Concurrency
///
/// [`create_vehicle_within_quota`] counts, checks and inserts inside one
/// transaction that first locks the owner's `users` row. Two concurrent
/// creations for the same user serialize on that lock, so the second one
/// sees the first one's vehicle in its count.
///
/// # Example
///
/// ```no_run
/// use flotteq_shared::quota::{create_vehicle_within_quota, QuotaEnforcer};
/// use flotteq_shared::models::vehicle::{CreateVehicle, FuelType};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, tenant_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let vehicle = create_vehicle_within_quota(&pool, CreateVehicle {
///     tenant_id,
///     user_id,
///     plate: "AB-123-CD".to_string(),
///     vin: None,
///     brand: "Renault".to_string(),
///     model: "Kangoo".to_string(),
///     year: Some(2021),
///     fuel_type: FuelType::Diesel,
///     mileage: 42_000,
///     color: None,
///     purchase_date: None,
///     purchase_price_cents: None,
///     notes: None,
/// }).await?;
///
/// let usage = QuotaEnforcer::new(pool).usage(user_id).await?;
/// println!("{} of {} vehicles used", usage.current, usage.limit);
/// # Ok(())
/// # }
/// ```

use crate::models::subscription::UserSubscription;
use crate::models::vehicle::{CreateVehicle, Vehicle};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

/// Vehicles a user may own without a subscription
pub const FREE_VEHICLE_LIMIT: i64 = 2;

/// Quota enforcement error
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// Free allowance used up and no current subscription
    #[error("Free plan allows {free_limit} vehicles; an active subscription is required to add more")]
    SubscriptionRequired { current: i64, free_limit: i64 },

    /// Current plan's allowance used up
    #[error("Vehicle limit reached for your plan ({current}/{limit})")]
    LimitExceeded { current: i64, limit: i64 },

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Result of a quota check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaCheckResult {
    /// Vehicles owned before the operation
    pub current: i64,

    /// Effective maximum
    pub limit: i64,

    /// Vehicles that may still be added
    pub remaining: i64,
}

impl QuotaCheckResult {
    fn allowed(current: i64, limit: i64) -> Self {
        QuotaCheckResult {
            current,
            limit,
            remaining: (limit - current).max(0),
        }
    }
}

/// The pure quota decision
pub struct QuotaPolicy;

impl QuotaPolicy {
    /// Decides whether a user owning `current` vehicles may add one more
    ///
    /// `plan_limit` is the `max_vehicles` of the user's current subscription,
    /// None without one. The effective limit never drops below the free
    /// allowance.
    pub fn evaluate(current: i64, plan_limit: Option<i64>) -> Result<QuotaCheckResult, QuotaError> {
        let limit = Self::effective_limit(plan_limit);

        if current < FREE_VEHICLE_LIMIT {
            return Ok(QuotaCheckResult::allowed(current, limit));
        }

        match plan_limit {
            None => Err(QuotaError::SubscriptionRequired {
                current,
                free_limit: FREE_VEHICLE_LIMIT,
            }),
            Some(_) if current < limit => Ok(QuotaCheckResult::allowed(current, limit)),
            Some(_) => Err(QuotaError::LimitExceeded { current, limit }),
        }
    }

    /// Maximum number of vehicles allowed with the given plan
    pub fn effective_limit(plan_limit: Option<i64>) -> i64 {
        plan_limit.map_or(FREE_VEHICLE_LIMIT, |limit| limit.max(FREE_VEHICLE_LIMIT))
    }
}

/// Creates a vehicle if the owner's quota allows it
///
/// Count, check and insert run in one transaction holding a row lock on the
/// owner, so concurrent requests cannot both pass the check.
///
/// # Errors
///
/// - `SubscriptionRequired` / `LimitExceeded` when the quota is used up
/// - `DatabaseError` otherwise, including duplicate plates
pub async fn create_vehicle_within_quota(
    pool: &PgPool,
    data: CreateVehicle,
) -> Result<Vehicle, QuotaError> {
    let user_id = data.user_id;
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let current = Vehicle::count_by_user(&mut *tx, user_id).await?;
    let plan_limit = UserSubscription::find_current(&mut *tx, user_id, Utc::now())
        .await?
        .map(|s| i64::from(s.max_vehicles));

    let check = QuotaPolicy::evaluate(current, plan_limit).map_err(|e| {
        info!(%user_id, current, ?plan_limit, "Vehicle creation blocked by quota");
        e
    })?;

    let vehicle = Vehicle::create(&mut *tx, data).await?;
    tx.commit().await?;

    debug!(
        %user_id,
        vehicle_id = %vehicle.id,
        remaining = check.remaining - 1,
        "Vehicle created within quota"
    );

    Ok(vehicle)
}

/// Quota usage of one user, for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct QuotaUsage {
    /// Vehicles owned
    pub current: i64,

    /// Effective maximum
    pub limit: i64,

    /// Vehicles that may still be added
    pub remaining: i64,

    /// Name of the current plan, None on the free allowance
    pub plan_name: Option<String>,

    /// Whether adding a vehicle needs a (bigger) subscription
    pub at_limit: bool,
}

/// Quota reporting service
pub struct QuotaEnforcer {
    db: PgPool,
}

impl QuotaEnforcer {
    /// Creates a new quota enforcer
    pub fn new(db: PgPool) -> Self {
        QuotaEnforcer { db }
    }

    /// Reports current usage against the effective limit
    pub async fn usage(&self, user_id: Uuid) -> Result<QuotaUsage, QuotaError> {
        let current = Vehicle::count_by_user(&self.db, user_id).await?;
        let subscription = UserSubscription::find_current(&self.db, user_id, Utc::now()).await?;

        let plan_limit = subscription.as_ref().map(|s| i64::from(s.max_vehicles));
        let limit = QuotaPolicy::effective_limit(plan_limit);

        Ok(QuotaUsage {
            current,
            limit,
            remaining: (limit - current).max(0),
            plan_name: subscription.map(|s| s.plan_name),
            at_limit: QuotaPolicy::evaluate(current, plan_limit).is_err(),
        })
    }
}
