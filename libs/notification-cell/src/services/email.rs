use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use shared_config::ClinicConfig;

use crate::models::{ChannelKind, Contact, Notice};
use crate::services::dispatcher::NotificationChannel;

/// SMTP email channel, the fallback when the phone channel cannot deliver.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailChannel {
    pub fn new(config: &ClinicConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .context("invalid SMTP host")?
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        let from = config
            .smtp_from
            .parse::<Mailbox>()
            .context("invalid SMTP_FROM mailbox")?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(&self, contact: &Contact, notice: &Notice) -> Result<()> {
        let to = contact
            .email
            .as_deref()
            .ok_or_else(|| anyhow!("contact has no email address"))?;

        debug!("Sending email '{}' to {}", notice.subject, to);

        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("invalid recipient address")?)
            .subject(notice.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(notice.email_html.clone())?;

        self.transport.send(email).await?;
        Ok(())
    }
}
