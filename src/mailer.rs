use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Outbound-only transport seam. Production wires up [`MailerStack`];
/// tests substitute a recording fake.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, mail: &OutboundEmail) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &AppConfig, host: &str) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .context("failed to configure SMTP relay")?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) =
            (config.smtp_username.clone(), config.smtp_password.clone())
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let from = config
            .mail_from
            .parse::<Mailbox>()
            .context("MAIL_FROM must be a valid mailbox")?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutboundEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mail
                .to
                .parse::<Mailbox>()
                .map_err(|err| anyhow!("invalid recipient address {}: {err}", mail.to))?)
            .subject(&mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())
            .context("failed to build email message")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}

/// Transactional email over a plain HTTP API, used when SMTP is absent
/// or refuses delivery.
pub struct ApiMailer {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl ApiMailer {
    pub fn new(endpoint: String, api_key: String, from: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ApiMailer {
    async fn send(&self, mail: &OutboundEmail) -> Result<()> {
        let payload = json!({
            "from": self.from,
            "to": mail.to,
            "subject": mail.subject,
            "html": mail.html_body,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("mail API request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            bail!("mail API responded with status {status}: {excerpt}");
        }

        Ok(())
    }
}

/// Tries SMTP first when configured and falls back to the HTTP API.
/// With neither backend configured every send fails, which the
/// reminder processor records as a terminal failure.
pub struct MailerStack {
    smtp: Option<SmtpMailer>,
    api: Option<ApiMailer>,
}

impl MailerStack {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let smtp = match config.smtp_host.as_deref() {
            Some(host) => Some(SmtpMailer::from_config(config, host)?),
            None => None,
        };

        let api = match (config.mail_api_endpoint.clone(), config.mail_api_key.clone()) {
            (Some(endpoint), Some(api_key)) => {
                Some(ApiMailer::new(endpoint, api_key, config.mail_from.clone()))
            }
            _ => None,
        };

        Ok(Self { smtp, api })
    }
}

#[async_trait]
impl Mailer for MailerStack {
    async fn send(&self, mail: &OutboundEmail) -> Result<()> {
        let smtp_error = match &self.smtp {
            Some(smtp) => match smtp.send(mail).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(error = %err, to = %mail.to, "SMTP delivery failed, trying mail API");
                    Some(err)
                }
            },
            None => None,
        };

        if let Some(api) = &self.api {
            return api.send(mail).await;
        }

        match smtp_error {
            Some(err) => Err(err),
            None => bail!("no mail transport configured"),
        }
    }
}
