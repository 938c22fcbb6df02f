use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use crate::{
    config::SmtpConfig,
    error::{AppError, AppResult},
};

/// Outbound mail. Delivery failures are reported, never retried here.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

pub fn build_message(from: &str, to: &str, subject: &str, body: &str) -> AppResult<Message> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid sender address: {e}")))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| AppError::invalid_input(format!("Invalid recipient email: {e}")))?;
    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("build email message: {e}")))
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: impl Into<String>) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from: from.into(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let message = build_message(&self.from, to, subject, body)?;
        match self.transport.send(message).await {
            Ok(_) => {
                info!(%to, %subject, "email sent");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, %to, "smtp send failed");
                Err(AppError::Internal(anyhow::anyhow!("send email: {e}")))
            }
        }
    }
}

/// Writes mail to the log instead of delivering it.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl EmailSender for LogMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        build_message(&self.from, to, subject, body)?;
        info!(from = %self.from, %to, %subject, %body, "email (not delivered, smtp disabled)");
        Ok(())
    }
}
