//! Outbound email. Delivery happens after a purchase commits and its
//! failure never undoes the purchase.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::config::EmailSettings;
use crate::models::{Event, Purchase};
use crate::utils::error::AppError;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

pub trait Notifier: Send + Sync + 'static {
    fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Records messages in the log instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), AppError> {
        info!(to, subject, "Email delivery disabled, message not sent");
        Ok(())
    }
}

#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &EmailSettings) -> Result<Self, AppError> {
        let from = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse::<Mailbox>()
            .map_err(|e| AppError::ExternalServiceError(format!("invalid sender address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| AppError::ExternalServiceError(format!("SMTP relay error: {}", e)))?
            .port(settings.port)
            .timeout(Some(SMTP_TIMEOUT));

        if let Some(username) = &settings.username {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                settings.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let recipient = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::ExternalServiceError(format!("invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::ExternalServiceError(format!("failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("SMTP send failed: {}", e)))?;

        info!(to, subject, "Email sent");
        Ok(())
    }
}

/// Notifier chosen at startup: SMTP when configured, log-only otherwise.
#[derive(Clone)]
pub enum AnyNotifier {
    Smtp(SmtpNotifier),
    Log(LogNotifier),
}

impl AnyNotifier {
    pub fn from_settings(settings: Option<&EmailSettings>) -> Result<Self, AppError> {
        match settings {
            Some(settings) => Ok(AnyNotifier::Smtp(SmtpNotifier::new(settings)?)),
            None => Ok(AnyNotifier::Log(LogNotifier)),
        }
    }
}

impl Notifier for AnyNotifier {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        match self {
            AnyNotifier::Smtp(notifier) => notifier.send(to, subject, body).await,
            AnyNotifier::Log(notifier) => notifier.send(to, subject, body).await,
        }
    }
}

pub fn purchase_confirmation(purchase: &Purchase, event: &Event) -> (String, String) {
    let subject = format!("Your tickets for {}", event.title);
    let body = format!(
        "Hi {name},\n\n\
         Thanks for your purchase.\n\n\
         Event: {title}\n\
         When: {start} UTC\n\
         Where: {address}\n\
         Tickets: {quantity}\n\
         Total: ${total}\n\
         Confirmation: {id}\n",
        name = purchase.guest_name,
        title = event.title,
        start = event.start_at.format("%Y-%m-%d %H:%M"),
        address = event.address,
        quantity = purchase.quantity,
        total = purchase.total_cost.round_dp(2),
        id = purchase.id,
    );
    (subject, body)
}
