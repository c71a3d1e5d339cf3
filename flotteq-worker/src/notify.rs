/// Outgoing notifications
///
/// The sweeps produce [`Notification`] values and hand them to a
/// [`Notifier`]. Three implementations exist:
///
/// - [`SmtpNotifier`]: plain-text email through an SMTP relay (lettre)
/// - [`LogNotifier`]: writes the notification to the log, used when SMTP is
///   not configured and for dry runs
/// - [`MemoryNotifier`]: keeps what it was given, for tests
///
/// # Example
///
/// ```no_run
/// use flotteq_worker::notify::{LogNotifier, Notification, Notifier};
///
/// # async fn example(notification: Notification) -> Result<(), Box<dyn std::error::Error>> {
/// let notifier = LogNotifier;
/// notifier.send(&notification).await?;
/// # Ok(())
/// # }
/// ```

use crate::config::{SmtpConfig, SmtpTls};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use flotteq_shared::models::{inspection::DueInspection, subscription::ExpiredSubscription};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::collections::HashSet;
use std::sync::Mutex;
use uuid::Uuid;

/// Notification delivery errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Sender or recipient is not a valid mailbox
    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    /// Message could not be assembled
    #[error("Failed to build message: {0}")]
    Build(String),

    /// SMTP relay refused or was unreachable
    #[error("SMTP error: {0}")]
    Transport(String),
}

/// Something the platform tells a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The user's plan lapsed and the vehicle quota fell back to the free allowance
    SubscriptionExpired {
        user_id: Uuid,
        email: String,
        first_name: Option<String>,
        plan_name: String,
        end_date: DateTime<Utc>,
    },

    /// A vehicle's contrôle technique falls due soon
    InspectionDue {
        user_id: Uuid,
        email: String,
        first_name: Option<String>,
        plate: String,
        vehicle: String,
        due_date: NaiveDate,
        days_left: i64,
    },
}

impl Notification {
    pub fn subscription_expired(row: &ExpiredSubscription) -> Self {
        Notification::SubscriptionExpired {
            user_id: row.user_id,
            email: row.email.clone(),
            first_name: row.first_name.clone(),
            plan_name: row.plan_name.clone(),
            end_date: row.end_date,
        }
    }

    pub fn inspection_due(row: &DueInspection, today: NaiveDate) -> Self {
        Notification::InspectionDue {
            user_id: row.owner_id,
            email: row.owner_email.clone(),
            first_name: row.owner_first_name.clone(),
            plate: row.plate.clone(),
            vehicle: format!("{} {}", row.brand, row.model),
            due_date: row.next_due_date,
            days_left: row.days_left(today),
        }
    }

    /// Kind tag used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::SubscriptionExpired { .. } => "subscription_expired",
            Notification::InspectionDue { .. } => "inspection_due",
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            Notification::SubscriptionExpired { user_id, .. }
            | Notification::InspectionDue { user_id, .. } => *user_id,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Notification::SubscriptionExpired { email, .. }
            | Notification::InspectionDue { email, .. } => email,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::SubscriptionExpired { plan_name, .. } => {
                format!("Votre abonnement {} a expiré", plan_name)
            }
            Notification::InspectionDue { plate, days_left, .. } => match days_left {
                0 => format!("Contrôle technique de {} à faire aujourd'hui", plate),
                1 => format!("Contrôle technique de {} à faire demain", plate),
                n => format!("Contrôle technique de {} dans {} jours", plate, n),
            },
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::SubscriptionExpired {
                first_name,
                plan_name,
                end_date,
                ..
            } => format!(
                "{}\n\n\
                 Votre abonnement {} a pris fin le {}.\n\
                 Vous pouvez continuer à gérer vos véhicules existants, mais l'ajout \
                 d'un véhicule au-delà des 2 véhicules gratuits nécessite un nouvel abonnement.\n\n\
                 L'équipe FlotteQ",
                greeting(first_name.as_deref()),
                plan_name,
                end_date.format("%d/%m/%Y"),
            ),
            Notification::InspectionDue {
                first_name,
                plate,
                vehicle,
                due_date,
                ..
            } => format!(
                "{}\n\n\
                 Le prochain contrôle technique de votre véhicule {} ({}) est prévu \
                 le {}.\n\
                 Pensez à prendre rendez-vous dans un centre agréé.\n\n\
                 L'équipe FlotteQ",
                greeting(first_name.as_deref()),
                vehicle,
                plate,
                due_date.format("%d/%m/%Y"),
            ),
        }
    }
}

fn greeting(first_name: Option<&str>) -> String {
    match first_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("Bonjour {},", name),
        None => "Bonjour,".to_string(),
    }
}

/// Delivers notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifier name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Email through an SMTP relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self, NotifyError> {
        let from: Mailbox = from
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(from.to_string()))?;

        let builder = match config.tls {
            SmtpTls::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?,
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let to: Mailbox = notification
            .recipient()
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(notification.recipient().to_string()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.message(notification)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// Logs notifications instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = notification.kind(),
            user_id = %notification.user_id(),
            to = notification.recipient(),
            subject = %notification.subject(),
            "Notification (not sent, SMTP disabled)"
        );
        Ok(())
    }
}

/// Captures notifications in memory
///
/// Recipients registered with [`MemoryNotifier::failing_for`] get a
/// transport error instead.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: HashSet<String>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: recipients.into_iter().map(Into::into).collect(),
        }
    }

    /// Notifications delivered so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.failing.contains(notification.recipient()) {
            return Err(NotifyError::Transport("550 mailbox unavailable".to_string()));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}
