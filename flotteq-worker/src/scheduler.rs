/// Daily scheduler
///
/// Sleeps until the configured UTC time, runs the expiration sweep then the
/// inspection reminder sweep, and repeats. A failed sweep is logged and the
/// loop carries on to the next day.
///
/// # Example
///
/// ```no_run
/// use flotteq_worker::{config::WorkerConfig, notify::LogNotifier, scheduler::Scheduler};
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example(pool: PgPool, config: WorkerConfig) {
/// let scheduler = Scheduler::new(pool, Arc::new(LogNotifier), config.schedule);
/// let shutdown = scheduler.shutdown_token();
///
/// tokio::spawn(async move {
///     let _ = tokio::signal::ctrl_c().await;
///     shutdown.cancel();
/// });
///
/// scheduler.run(false).await;
/// # }
/// ```

use crate::{
    config::ScheduleConfig,
    jobs::{self, SweepReport},
    notify::Notifier,
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// First instant strictly after `now` at `hour:minute` UTC
pub fn next_run_after(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(time).and_utc();

    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Reports of one scheduled run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub expirations: Option<SweepReport>,
    pub reminders: Option<SweepReport>,
}

pub struct Scheduler {
    pool: PgPool,
    notifier: Arc<dyn Notifier>,
    schedule: ScheduleConfig,
    shutdown_token: CancellationToken,
}

impl Scheduler {
    pub fn new(pool: PgPool, notifier: Arc<dyn Notifier>, schedule: ScheduleConfig) -> Self {
        Self {
            pool,
            notifier,
            schedule,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs both sweeps once
    ///
    /// The reminder sweep still runs when the expiration sweep fails.
    pub async fn run_once(&self, now: DateTime<Utc>) -> RunReport {
        let expirations = match jobs::expire_subscriptions(&self.pool, self.notifier.as_ref(), now).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Subscription expiration sweep failed");
                None
            }
        };

        let reminders = match jobs::remind_inspections(
            &self.pool,
            self.notifier.as_ref(),
            now.date_naive(),
            self.schedule.reminder_window_days,
        )
        .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, "Inspection reminder sweep failed");
                None
            }
        };

        RunReport {
            expirations,
            reminders,
        }
    }

    /// Loops until the shutdown token is cancelled
    ///
    /// With `run_now`, the sweeps also run once at startup.
    pub async fn run(&self, run_now: bool) {
        tracing::info!(
            hour = self.schedule.hour_utc,
            minute = self.schedule.minute_utc,
            notifier = self.notifier.name(),
            "Scheduler started"
        );

        if run_now {
            self.run_once(Utc::now()).await;
        }

        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.schedule.hour_utc, self.schedule.minute_utc);
            let wait = (next - now).to_std().unwrap_or_default();

            tracing::debug!(next_run = %next, "Waiting for next sweep");

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    self.run_once(Utc::now()).await;
                }
            }
        }
    }
}
