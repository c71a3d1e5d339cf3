/// Daily sweeps
///
/// - [`expire_subscriptions`]: deactivates enrollments past their end date and
///   tells each affected user once
/// - [`remind_inspections`]: tells vehicle owners their contrôle technique is
///   coming up, at most once per inspection per day
///
/// A notification that fails is logged and counted. It never aborts the rest
/// of the batch, and a failed reminder is not stamped so the next run retries it.
/// A stamp that fails is counted in `unstamped`; that reminder may go out again
/// on the next run.

use crate::notify::{Notification, Notifier};
use chrono::{DateTime, NaiveDate, Utc};
use flotteq_shared::models::{inspection::TechnicalInspection, subscription::UserSubscription};
use serde::Serialize;
use sqlx::PgPool;
use std::{collections::HashSet, future::Future};
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Rows the sweep acted on
    pub matched: usize,
    pub notified: usize,
    pub failed: usize,
    /// Delivered reminders whose stamp could not be written
    pub unstamped: usize,
}

/// Sends every notification, returning the report and the indices delivered
pub async fn fan_out(
    notifier: &dyn Notifier,
    notifications: &[Notification],
) -> (SweepReport, Vec<usize>) {
    let mut report = SweepReport {
        matched: notifications.len(),
        ..SweepReport::default()
    };
    let mut delivered = Vec::with_capacity(notifications.len());

    for (index, notification) in notifications.iter().enumerate() {
        match notifier.send(notification).await {
            Ok(()) => {
                report.notified += 1;
                delivered.push(index);
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    notifier = notifier.name(),
                    kind = notification.kind(),
                    user_id = %notification.user_id(),
                    error = %e,
                    "Notification failed"
                );
            }
        }
    }

    (report, delivered)
}

/// Keeps the first notification per user
fn one_per_user(notifications: Vec<Notification>) -> Vec<Notification> {
    let mut seen = HashSet::new();
    notifications
        .into_iter()
        .filter(|n| seen.insert(n.user_id()))
        .collect()
}

/// Deactivates every active enrollment whose end date is before `now`
///
/// `matched` counts deactivated rows; a user who had several gets one email.
pub async fn expire_subscriptions(
    pool: &PgPool,
    notifier: &dyn Notifier,
    now: DateTime<Utc>,
) -> Result<SweepReport, sqlx::Error> {
    let expired = UserSubscription::expire_overdue(pool, now).await?;
    if expired.is_empty() {
        info!("No subscription to expire");
        return Ok(SweepReport::default());
    }

    let notifications = one_per_user(expired.iter().map(Notification::subscription_expired).collect());
    let (mut report, _) = fan_out(notifier, &notifications).await;
    report.matched = expired.len();

    info!(
        expired = report.matched,
        notified = report.notified,
        failed = report.failed,
        "Subscription expiration sweep finished"
    );

    Ok(report)
}

/// Reminds owners of inspections due between `today` and `today + window_days`
///
/// Each delivered reminder is stamped with `today`, so a second run on the
/// same day sends nothing.
pub async fn remind_inspections(
    pool: &PgPool,
    notifier: &dyn Notifier,
    today: NaiveDate,
    window_days: i64,
) -> Result<SweepReport, sqlx::Error> {
    let due = TechnicalInspection::due_within(pool, today, window_days).await?;
    if due.is_empty() {
        info!(window_days, "No inspection reminder to send");
        return Ok(SweepReport::default());
    }

    let notifications: Vec<Notification> = due
        .iter()
        .map(|row| Notification::inspection_due(row, today))
        .collect();
    let (mut report, delivered) = fan_out(notifier, &notifications).await;

    report.unstamped = stamp_delivered(
        delivered.into_iter().map(|index| due[index].inspection_id),
        |inspection_id| TechnicalInspection::mark_reminded(pool, inspection_id, today),
    )
    .await;

    info!(
        due = report.matched,
        notified = report.notified,
        failed = report.failed,
        unstamped = report.unstamped,
        window_days,
        "Inspection reminder sweep finished"
    );

    Ok(report)
}

/// Stamps every delivered inspection, returning how many stamps failed
///
/// A database error on one stamp does not stop the others.
async fn stamp_delivered<F, Fut>(inspection_ids: impl IntoIterator<Item = Uuid>, mut stamp: F) -> usize
where
    F: FnMut(Uuid) -> Fut,
    Fut: Future<Output = Result<bool, sqlx::Error>>,
{
    let mut unstamped = 0;

    for inspection_id in inspection_ids {
        match stamp(inspection_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(inspection_id = %inspection_id, "Inspection vanished before it could be stamped");
            }
            Err(e) => {
                unstamped += 1;
                warn!(inspection_id = %inspection_id, error = %e, "Failed to stamp inspection reminder");
            }
        }
    }

    unstamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use std::sync::Mutex;

    fn expired(user_id: Uuid, email: &str) -> Notification {
        Notification::SubscriptionExpired {
            user_id,
            email: email.to_string(),
            first_name: None,
            plan_name: "Essentiel".to_string(),
            end_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_continues_after_failure() {
        let notifier = MemoryNotifier::failing_for(["b@flotte.fr"]);
        let notifications = vec![
            expired(Uuid::new_v4(), "a@flotte.fr"),
            expired(Uuid::new_v4(), "b@flotte.fr"),
            expired(Uuid::new_v4(), "c@flotte.fr"),
        ];

        let (report, delivered) = fan_out(&notifier, &notifications).await;

        assert_eq!(
            report,
            SweepReport {
                matched: 3,
                notified: 2,
                failed: 1,
                unstamped: 0,
            }
        );
        assert_eq!(delivered, vec![0, 2]);
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_fan_out_empty() {
        let (report, delivered) = fan_out(&MemoryNotifier::new(), &[]).await;

        assert_eq!(report, SweepReport::default());
        assert!(delivered.is_empty());
    }

    #[tokio::test]
    async fn test_stamping_continues_after_database_error() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let broken = ids[1];
        let gone = ids[2];
        let attempted = Mutex::new(Vec::new());

        let unstamped = stamp_delivered(ids.clone(), |id| {
            attempted.lock().unwrap().push(id);
            async move {
                if id == broken {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(id != gone)
                }
            }
        })
        .await;

        assert_eq!(unstamped, 1);
        assert_eq!(*attempted.lock().unwrap(), ids);
    }

    #[tokio::test]
    async fn test_stamping_counts_every_failure() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        let unstamped = stamp_delivered(ids, |_| async { Err(sqlx::Error::PoolClosed) }).await;

        assert_eq!(unstamped, 3);
    }

    #[test]
    fn test_one_per_user() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        let kept = one_per_user(vec![
            expired(user, "a@flotte.fr"),
            expired(other, "b@flotte.fr"),
            expired(user, "a@flotte.fr"),
        ]);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].user_id(), user);
        assert_eq!(kept[1].user_id(), other);
    }
}
