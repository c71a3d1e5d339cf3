//! # FlotteQ Worker Library
//!
//! Scheduled background work for FlotteQ.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `jobs`: subscription expiration and contrôle technique reminder sweeps
//! - `notify`: notification rendering and delivery (SMTP, log, memory)
//! - `scheduler`: daily loop running the sweeps
//! - `doctor`: diagnostics
//! - `seed`: demo data
//! - `staff`: back-office staff accounts
//!
//! ## Example
//!
//! ```no_run
//! use flotteq_worker::{jobs, notify::LogNotifier};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! let report = jobs::expire_subscriptions(&pool, &LogNotifier, chrono::Utc::now()).await?;
//! println!("{} subscriptions expired", report.matched);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod doctor;
pub mod jobs;
pub mod notify;
pub mod scheduler;
pub mod seed;
pub mod staff;
