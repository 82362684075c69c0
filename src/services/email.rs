//! Outgoing mail
//!
//! Password reset links are delivered over SMTP when `mail.smtp_host` is
//! configured. `Mailer` is a trait so the auth service can run without SMTP.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::MailConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the reset link for `token` to `to_email`.
    async fn send_password_reset(&self, to_email: &str, token: &str) -> Result<()>;
}

/// SMTP mailer built from `MailConfig`
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Mailer for the configuration, or None when SMTP is not configured.
    pub fn from_config(config: &MailConfig) -> Option<Arc<dyn Mailer>> {
        if config.is_enabled() {
            Some(Arc::new(Self::new(config.clone())))
        } else {
            None
        }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self
            .config
            .smtp_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| anyhow!("SMTP host not configured"))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(self.config.smtp_port);

        if !self.config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(&self, to_email: &str, token: &str) -> Result<()> {
        let email = Message::builder()
            .from(
                self.config
                    .from
                    .parse()
                    .map_err(|e| anyhow!("Invalid from address: {}", e))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject("Password reset token")
            .header(ContentType::TEXT_PLAIN)
            .body(reset_message(&self.config.reset_url_base, token))
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport()?
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::info!(to = to_email, "password reset mail sent");
        Ok(())
    }
}

/// Plain-text body of the reset mail
pub fn reset_message(reset_url_base: &str, token: &str) -> String {
    format!(
        "You are receiving this email because you (or someone else) requested a password reset.\n\n\
         Open the following link to choose a new password:\n\n{}{}\n\n\
         The link expires shortly. If you did not request this, ignore this email.",
        reset_url_base, token
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_message_contains_link() {
        let body = reset_message("http://localhost:3000/reset-password/", "abc123");
        assert!(body.contains("http://localhost:3000/reset-password/abc123"));
    }

    #[test]
    fn test_disabled_without_host() {
        assert!(SmtpMailer::from_config(&MailConfig::default()).is_none());

        let config = MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            ..MailConfig::default()
        };
        assert!(SmtpMailer::from_config(&config).is_some());
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_error() {
        let mailer = SmtpMailer::new(MailConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            ..MailConfig::default()
        });
        let err = mailer
            .send_password_reset("not an address", "tok")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid to address"));
    }
}
