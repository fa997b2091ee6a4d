//! Outgoing email.
//!
//! - [`EmailProvider`]: core trait for delivery implementations
//! - [`EmailService`]: fire-and-forget wrapper with observability

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{Result, TRACING_TARGET_EMAIL};

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Core trait for email delivery.
#[async_trait::async_trait]
pub trait EmailProvider: Send + Sync {
    /// Delivers one message.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Provider that only logs messages, used when no mail transport is set up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailProvider;

#[async_trait::async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            target: TRACING_TARGET_EMAIL,
            to = %message.to,
            subject = %message.subject,
            "email logged instead of delivered"
        );
        Ok(())
    }
}

/// Provider keeping every message in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryEmailProvider {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl MemoryEmailProvider {
    /// Returns the messages sent so far.
    pub fn outbox(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl EmailProvider for MemoryEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

/// Email service shared through the application state.
#[derive(Clone)]
pub struct EmailService {
    inner: Arc<dyn EmailProvider>,
}

impl fmt::Debug for EmailService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailService").finish_non_exhaustive()
    }
}

impl Default for EmailService {
    fn default() -> Self {
        Self::new(LogEmailProvider)
    }
}

impl EmailService {
    pub fn new<P>(provider: P) -> Self
    where
        P: EmailProvider + 'static,
    {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Delivers a message and logs the outcome.
    ///
    /// An empty recipient is logged and skipped.
    pub async fn deliver(&self, message: EmailMessage) {
        if message.to.trim().is_empty() {
            tracing::warn!(
                target: TRACING_TARGET_EMAIL,
                subject = %message.subject,
                "email without recipient skipped"
            );
            return;
        }

        match self.inner.send(&message).await {
            Ok(()) => tracing::debug!(
                target: TRACING_TARGET_EMAIL,
                to = %message.to,
                subject = %message.subject,
                "email sent"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET_EMAIL,
                to = %message.to,
                subject = %message.subject,
                error = %error,
                "email delivery failed"
            ),
        }
    }

    /// Sends a message in the background without waiting for delivery.
    pub fn send(&self, to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) {
        let service = self.clone();
        let message = EmailMessage {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
        };

        tokio::spawn(async move { service.deliver(message).await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.into(),
            subject: "Reset your password".into(),
            html: "<p>token</p>".into(),
        }
    }

    #[tokio::test]
    async fn delivers_to_provider() {
        let provider = MemoryEmailProvider::default();
        let service = EmailService::new(provider.clone());

        service.deliver(message("jane@example.com")).await;
        assert_eq!(provider.outbox(), vec![message("jane@example.com")]);
    }

    #[tokio::test]
    async fn empty_recipient_is_skipped() {
        let provider = MemoryEmailProvider::default();
        let service = EmailService::new(provider.clone());

        service.deliver(message("  ")).await;
        assert!(provider.outbox().is_empty());
    }
}
