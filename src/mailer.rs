//! Confirmation-code delivery.
//!
//! Signup hands a freshly issued code to a [`ConfirmationMailer`]; the SMTP
//! implementation relays it with lettre, the log implementation just prints
//! it for development and test runs.

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::info;

use crate::config::MailConfig;

pub type MailResult<T> = Result<T, MailError>;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail config error: {0}")]
    Config(String),
    #[error("mail build error: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("mail send error: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait ConfirmationMailer: Send + Sync {
    async fn deliver(&self, to: &str, username: &str, code: &str) -> MailResult<()>;
}

/// Picks the transport matching the config.
#[must_use]
pub fn build_mailer(config: &MailConfig) -> Arc<dyn ConfirmationMailer> {
    if config.enabled {
        Arc::new(SmtpMailer::new(config.clone()))
    } else {
        Arc::new(LogMailer)
    }
}

pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    #[must_use]
    pub const fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> MailResult<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let transport = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
                .credentials(creds)
                .port(self.config.smtp_port)
                .build()
        };

        Ok(transport)
    }
}

#[async_trait]
impl ConfirmationMailer for SmtpMailer {
    async fn deliver(&self, to: &str, username: &str, code: &str) -> MailResult<()> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(|e| MailError::Config(format!("Invalid from address: {e}")))?;

        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| MailError::Config(format!("Invalid to address: {e}")))?;

        let email = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject("Your YaMDb confirmation code")
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "Hello {username},\n\nYour confirmation code is: {code}\n\nExchange it at /api/v1/auth/token/ for an access token.\n"
            ))?;

        self.transport()?.send(email).await?;

        info!("Confirmation code sent to {to}");

        Ok(())
    }
}

/// Development transport: the code goes to the log and delivery always
/// succeeds.
pub struct LogMailer;

#[async_trait]
impl ConfirmationMailer for LogMailer {
    async fn deliver(&self, to: &str, username: &str, code: &str) -> MailResult<()> {
        info!("MOCK MAIL to {to}: confirmation code for {username} is {code}");
        Ok(())
    }
}
