use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::EmailConfig;
use crate::database::models::User;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail service rejected message: {0}")]
    Rejected(String),
}

/// Plain-text message
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl Email {
    pub fn welcome(user: &User, url: &str) -> Self {
        Self {
            to: user.email.clone(),
            subject: "Welcome to the Natours family!".to_string(),
            text: format!(
                "Hi {},\n\nWelcome to Natours, we're glad to have you! Upload a profile photo and start exploring: {}\n",
                first_name(&user.name),
                url
            ),
        }
    }

    pub fn password_reset(user: &User, url: &str, ttl_minutes: i64) -> Self {
        Self {
            to: user.email.clone(),
            subject: format!("Your password reset token (valid for only {} minutes)", ttl_minutes),
            text: format!(
                "Hi {},\n\nForgot your password? Submit a PATCH request with your new password and \
                 password_confirm to: {}\nIf you didn't forget your password, please ignore this email.\n",
                first_name(&user.name),
                url
            ),
        }
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Builds the mailer the configuration asks for
pub fn from_config(config: &EmailConfig) -> Arc<dyn Mailer> {
    match (&config.api_url, &config.api_key) {
        (Some(url), Some(key)) => Arc::new(HttpMailer::new(url.clone(), key.clone(), config.from.clone())),
        _ => Arc::new(LogMailer),
    }
}

/// Writes messages to the log instead of delivering them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "email (not delivered)\n{}", email.text);
        Ok(())
    }
}

/// Delivers through a transactional mail HTTP API (SendGrid v3 shaped payload)
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }

    fn payload(&self, email: &Email) -> serde_json::Value {
        json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": sender_address(&self.from), "name": sender_name(&self.from) },
            "subject": email.subject,
            "content": [{ "type": "text/plain", "value": email.text }],
        })
    }
}

/// `Natours <hello@natours.io>` -> `hello@natours.io`
fn sender_address(from: &str) -> &str {
    match (from.find('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => &from[start + 1..end],
        _ => from.trim(),
    }
}

fn sender_name(from: &str) -> &str {
    from.find('<').map(|i| from[..i].trim()).unwrap_or("")
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(&email))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{} {}", status, body)));
        }

        info!(to = %email.to, subject = %email.subject, "email delivered");
        Ok(())
    }
}
