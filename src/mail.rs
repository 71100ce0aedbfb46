use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::MailConfig;

/// Plain-text message handed to a [`Mailer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

/// SMTP delivery through lettre's tokio transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// Returns `None` when no SMTP host is configured.
    pub fn from_config(cfg: &MailConfig) -> anyhow::Result<Option<Self>> {
        let Some(host) = cfg.smtp_host.as_deref() else {
            return Ok(None);
        };
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .with_context(|| format!("smtp relay {}", host))?
            .port(cfg.smtp_port)
            .timeout(Some(std::time::Duration::from_secs(10)));
        if let (Some(user), Some(pass)) = (&cfg.smtp_username, &cfg.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Some(Self {
            transport: builder.build(),
            from: cfg.from.clone(),
        }))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse().context("invalid from address")?)
            .to(email.to.parse().context("invalid recipient address")?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .context("build email")?;
        self.transport.send(message).await.context("smtp send")?;
        info!(to = %email.to, "email sent");
        Ok(())
    }
}

/// Keeps every message in memory and logs it instead of delivering it.
#[derive(Default)]
pub struct OutboxMailer {
    sent: RwLock<Vec<Email>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, "email queued in outbox");
        debug!(body = %email.body, "outbox email body");
        self.sent.write().await.push(email);
        Ok(())
    }
}

pub fn verification_email(to: &str, username: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Verify your Authors Haven account".into(),
        body: format!(
            "Hi {},\n\n\
             Thanks for joining Authors Haven. Confirm your email address by opening the link below:\n\n\
             {}\n\n\
             If you did not create an account, you can ignore this message.\n",
            username, link
        ),
    }
}

pub fn password_reset_email(to: &str, username: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Reset your Authors Haven password".into(),
        body: format!(
            "Hi {},\n\n\
             We received a request to reset your password. Choose a new one here:\n\n\
             {}\n\n\
             The link can be used once. If you did not ask for a reset, no action is needed.\n",
            username, link
        ),
    }
}
