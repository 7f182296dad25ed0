//! Delivery of verification codes over SMS or email.
//!
//! Channels without a configured notifier run in development mode: the code
//! is written to the log and returned to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::contact::{Contact, ContactType};
use crate::error::AppError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    channel: ContactType,
    to: &'a str,
    message: &'a str,
}

/// Posts `{channel, to, message}` as JSON to a provider webhook.
pub struct WebhookNotifier {
    channel: ContactType,
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(channel: ContactType, url: String) -> Self {
        Self {
            channel,
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, to: &str, message: &str) -> Result<(), AppError> {
        let body = WebhookMessage {
            channel: self.channel,
            to,
            message,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::Notifier(err.to_string()))?;
        if !response.status().is_success() {
            return Err(AppError::Notifier(format!(
                "{} webhook answered {}",
                self.channel,
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No notifier for the channel; the code must be surfaced to the caller.
    DevMode,
}

#[derive(Clone, Default)]
pub struct Notifiers {
    sms: Option<Arc<dyn Notifier>>,
    email: Option<Arc<dyn Notifier>>,
}

impl Notifiers {
    #[cfg(test)]
    pub fn new(sms: Option<Arc<dyn Notifier>>, email: Option<Arc<dyn Notifier>>) -> Self {
        Self { sms, email }
    }

    pub fn from_webhooks(sms_webhook: Option<String>, email_webhook: Option<String>) -> Self {
        let webhook = |channel, url: Option<String>| {
            url.filter(|url| !url.trim().is_empty())
                .map(|url| Arc::new(WebhookNotifier::new(channel, url)) as Arc<dyn Notifier>)
        };
        Self {
            sms: webhook(ContactType::Phone, sms_webhook),
            email: webhook(ContactType::Email, email_webhook),
        }
    }

    fn channel(&self, kind: ContactType) -> Option<&Arc<dyn Notifier>> {
        match kind {
            ContactType::Phone => self.sms.as_ref(),
            ContactType::Email => self.email.as_ref(),
        }
    }

    pub async fn deliver_code(&self, contact: &Contact, code: &str) -> Result<Delivery, AppError> {
        let Some(notifier) = self.channel(contact.kind) else {
            tracing::info!(
                contact = %contact.value,
                channel = %contact.kind,
                code,
                "no notifier configured, verification code issued in development mode"
            );
            return Ok(Delivery::DevMode);
        };
        let message = format!("Your verification code is {code}");
        notifier.send(&contact.value, &message).await?;
        tracing::info!(contact = %contact.value, channel = %contact.kind, "verification code sent");
        Ok(Delivery::Sent)
    }
}
