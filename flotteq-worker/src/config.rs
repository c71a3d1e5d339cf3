/// Worker configuration
///
/// Read from the environment through the `config` crate, after `.env` has
/// been loaded:
///
/// | Variable | Default |
/// |---|---|
/// | `DATABASE_URL` | required |
/// | `DATABASE_MAX_CONNECTIONS` | 5 |
/// | `SWEEP_HOUR_UTC` / `SWEEP_MINUTE_UTC` | 6 / 0 |
/// | `REMINDER_WINDOW_DAYS` | 30 (1 to 366) |
/// | `SMTP_HOST` | unset: notifications are only logged |
/// | `SMTP_PORT` | 587 |
/// | `SMTP_USERNAME` / `SMTP_PASSWORD` | unset: no authentication |
/// | `SMTP_TLS` | `starttls` (`tls`, `none`) |
/// | `MAIL_FROM` | `FlotteQ <notifications@flotteq.fr>` |

use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment};
use flotteq_shared::models::inspection::MAX_REMINDER_WINDOW_DAYS;
use serde::Deserialize;

/// Default inspection reminder window
pub const DEFAULT_REMINDER_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub schedule: ScheduleConfig,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
}

/// When the daily sweeps run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub hour_utc: u32,
    pub minute_utc: u32,

    /// Inspections due within this many days get a reminder
    pub reminder_window_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (port 587)
    Starttls,

    /// Implicit TLS (port 465)
    Tls,

    /// Unencrypted, local relays only
    None,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: SmtpTls,
}

/// Flat view of the environment
#[derive(Debug, Deserialize)]
struct RawSettings {
    database_url: Option<String>,
    database_max_connections: u32,
    sweep_hour_utc: u32,
    sweep_minute_utc: u32,
    reminder_window_days: i64,
    smtp_host: Option<String>,
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    smtp_tls: SmtpTls,
    mail_from: String,
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::build(Config::builder().add_source(Environment::default().try_parsing(true)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawSettings = builder
            .set_default("database_max_connections", 5)?
            .set_default("sweep_hour_utc", 6)?
            .set_default("sweep_minute_utc", 0)?
            .set_default("reminder_window_days", DEFAULT_REMINDER_WINDOW_DAYS)?
            .set_default("smtp_port", 587)?
            .set_default("smtp_tls", "starttls")?
            .set_default("mail_from", "FlotteQ <notifications@flotteq.fr>")?
            .build()?
            .try_deserialize()?;

        let database_url = raw
            .database_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::NotFound("DATABASE_URL".to_string()))?;

        if raw.sweep_hour_utc > 23 || raw.sweep_minute_utc > 59 {
            return Err(ConfigError::Message(format!(
                "Invalid sweep time {:02}:{:02} (UTC)",
                raw.sweep_hour_utc, raw.sweep_minute_utc
            )));
        }

        if !(1..=MAX_REMINDER_WINDOW_DAYS).contains(&raw.reminder_window_days) {
            return Err(ConfigError::Message(format!(
                "REMINDER_WINDOW_DAYS must be between 1 and {}",
                MAX_REMINDER_WINDOW_DAYS
            )));
        }

        let smtp = raw.smtp_host.filter(|host| !host.is_empty()).map(|host| SmtpConfig {
            host,
            port: raw.smtp_port,
            username: raw.smtp_username.filter(|u| !u.is_empty()),
            password: raw.smtp_password,
            tls: raw.smtp_tls,
        });

        Ok(Self {
            database_url,
            database_max_connections: raw.database_max_connections,
            schedule: ScheduleConfig {
                hour_utc: raw.sweep_hour_utc,
                minute_utc: raw.sweep_minute_utc,
                reminder_window_days: raw.reminder_window_days,
            },
            smtp,
            mail_from: raw.mail_from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ConfigBuilder<DefaultState> {
        Config::builder()
            .set_override("database_url", "postgresql://localhost/flotteq")
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::build(builder()).unwrap();

        assert_eq!(config.database_max_connections, 5);
        assert_eq!(
            config.schedule,
            ScheduleConfig {
                hour_utc: 6,
                minute_utc: 0,
                reminder_window_days: 30,
            }
        );
        assert!(config.smtp.is_none());
        assert_eq!(config.mail_from, "FlotteQ <notifications@flotteq.fr>");
    }

    #[test]
    fn test_smtp_enabled_by_host() {
        let config = WorkerConfig::build(
            builder()
                .set_override("smtp_host", "smtp.example.org")
                .unwrap()
                .set_override("smtp_port", 465)
                .unwrap()
                .set_override("smtp_tls", "tls")
                .unwrap(),
        )
        .unwrap();

        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.org");
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.tls, SmtpTls::Tls);
        assert!(smtp.username.is_none());
    }

    #[test]
    fn test_database_url_required() {
        let err = WorkerConfig::build(Config::builder()).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_reminder_window_bounds() {
        for days in [0, 367, 100_000_000] {
            let result =
                WorkerConfig::build(builder().set_override("reminder_window_days", days).unwrap());
            assert!(result.is_err(), "window of {} days should be rejected", days);
        }

        let config =
            WorkerConfig::build(builder().set_override("reminder_window_days", 366).unwrap()).unwrap();
        assert_eq!(config.schedule.reminder_window_days, 366);
    }

    #[test]
    fn test_invalid_sweep_time() {
        let result = WorkerConfig::build(builder().set_override("sweep_hour_utc", 24).unwrap());
        assert!(result.is_err());
    }
}
