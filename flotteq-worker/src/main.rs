//! # FlotteQ Worker
//!
//! Runs the daily sweeps (subscription expiration, contrôle technique
//! reminders) and a few maintenance commands.
//!
//! ## Usage
//!
//! ```bash
//! flotteq-worker                          # daily scheduler
//! flotteq-worker run --now                # scheduler, sweeping once at startup
//! flotteq-worker expire-subscriptions
//! flotteq-worker remind-inspections --dry-run --days 15
//! flotteq-worker doctor
//! flotteq-worker seed-demo --password 'demo-password'
//! flotteq-worker create-staff --email ops@flotteq.fr --password '...' --role super_admin
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use flotteq_shared::{
    db::pool::{close_pool, create_pool, DatabaseConfig},
    models::inspection::{TechnicalInspection, MAX_REMINDER_WINDOW_DAYS},
};
use flotteq_worker::{
    config::WorkerConfig,
    doctor, jobs,
    notify::{LogNotifier, Notifier, SmtpNotifier},
    scheduler::Scheduler,
    seed::{self, SeedOutcome},
    staff::{self, StaffOutcome, StaffRole},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flotteq-worker", version, about = "FlotteQ background worker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daily scheduler (default)
    Run {
        /// Also sweep once right away
        #[arg(long)]
        now: bool,
    },
    /// Deactivate subscriptions past their end date and notify their users
    ExpireSubscriptions,
    /// Send contrôle technique reminders
    RemindInspections {
        /// List what would be sent without sending or stamping anything
        #[arg(long)]
        dry_run: bool,
        /// Reminder window in days, 1 to 366 (defaults to REMINDER_WINDOW_DAYS)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_REMINDER_WINDOW_DAYS))]
        days: Option<i64>,
    },
    /// Check database, migrations and pool; prints JSON
    Doctor,
    /// Create a demo tenant with vehicles
    SeedDemo {
        #[arg(long, env = "DEMO_PASSWORD", default_value = "FlotteqDemo2024")]
        password: String,
    },
    /// Create a back-office staff account (no tenant)
    CreateStaff {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STAFF_PASSWORD")]
        password: String,
        #[arg(long, value_enum, default_value = "support")]
        role: StaffRole,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = WorkerConfig::from_env().context("Invalid configuration")?;
    init_tracing();

    tracing::info!("FlotteQ Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let pool = create_pool(
        DatabaseConfig::from_url(&config.database_url)
            .with_max_connections(config.database_max_connections),
    )
    .await
    .context("Failed to connect to the database")?;

    let result = execute(cli.command.unwrap_or(Command::Run { now: false }), &pool, &config).await;

    close_pool(pool).await;
    result
}

async fn execute(command: Command, pool: &PgPool, config: &WorkerConfig) -> anyhow::Result<()> {
    match command {
        Command::Run { now } => {
            let scheduler = Scheduler::new(pool.clone(), build_notifier(config)?, config.schedule);
            let shutdown = scheduler.shutdown_token();

            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    return;
                }
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            });

            scheduler.run(now).await;
        }
        Command::ExpireSubscriptions => {
            let notifier = build_notifier(config)?;
            let report = jobs::expire_subscriptions(pool, notifier.as_ref(), Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::RemindInspections { dry_run, days } => {
            let today = Utc::now().date_naive();
            let window = days.unwrap_or(config.schedule.reminder_window_days);

            if dry_run {
                let due = TechnicalInspection::due_within(pool, today, window).await?;
                for row in &due {
                    println!(
                        "{}\t{}\t{}\t{} day(s)\t{}",
                        row.next_due_date,
                        row.plate,
                        row.owner_email,
                        row.days_left(today),
                        row.tenant_id
                    );
                }
                tracing::info!(due = due.len(), window, "Dry run, nothing sent");
            } else {
                let notifier = build_notifier(config)?;
                let report = jobs::remind_inspections(pool, notifier.as_ref(), today, window).await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Command::Doctor => {
            let report = doctor::diagnose(pool, config.schedule.reminder_window_days).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            anyhow::ensure!(report.is_healthy(), "{} problem(s) found", report.problems.len());
        }
        Command::SeedDemo { password } => match seed::seed_demo(pool, &password).await? {
            SeedOutcome::Created { tenant_id, admin_id } => {
                println!("Demo tenant {} created, admin {} ({})", tenant_id, admin_id, seed::DEMO_ADMIN_EMAIL);
            }
            SeedOutcome::AlreadyPresent { admin_id } => {
                println!("Demo data already present (admin {})", admin_id);
            }
        },
        Command::CreateStaff { email, password, role } => {
            match staff::create_staff(pool, &email, &password, role).await? {
                StaffOutcome::Created { user_id } => {
                    println!("Staff user {} created with role {}", user_id, role.as_str());
                }
                StaffOutcome::RoleGranted { user_id } => {
                    println!("Staff user {} already exists, role {} granted", user_id, role.as_str());
                }
            }
        }
    }

    Ok(())
}

fn build_notifier(config: &WorkerConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.smtp {
        Some(smtp) => {
            let notifier = SmtpNotifier::new(smtp, &config.mail_from)
                .context("Invalid SMTP configuration")?;
            tracing::info!(host = %smtp.host, port = smtp.port, "Sending notifications through SMTP");
            Ok(Arc::new(notifier))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, notifications will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "flotteq_worker=debug,flotteq_shared=info".into());

    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_must_fit_the_window() {
        let parsed = Cli::try_parse_from(["flotteq-worker", "remind-inspections", "--days", "15"]).unwrap();
        assert!(matches!(
            parsed.command,
            Some(Command::RemindInspections { days: Some(15), dry_run: false })
        ));

        for days in ["0", "367", "100000000"] {
            assert!(
                Cli::try_parse_from(["flotteq-worker", "remind-inspections", "--days", days]).is_err(),
                "--days {} should be rejected",
                days
            );
        }
    }

    #[test]
    fn test_create_staff_arguments() {
        let parsed = Cli::try_parse_from([
            "flotteq-worker",
            "create-staff",
            "--email",
            "ops@flotteq.fr",
            "--password",
            "Flotte2024secure",
            "--role",
            "super_admin",
        ])
        .unwrap();

        match parsed.command {
            Some(Command::CreateStaff { email, role, .. }) => {
                assert_eq!(email, "ops@flotteq.fr");
                assert_eq!(role, StaffRole::SuperAdmin);
            }
            _ => panic!("expected create-staff"),
        }

        assert!(Cli::try_parse_from([
            "flotteq-worker",
            "create-staff",
            "--email",
            "ops@flotteq.fr",
            "--password",
            "Flotte2024secure",
            "--role",
            "admin",
        ])
        .is_err());
    }
}
