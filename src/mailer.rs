// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outbound dispatch of accepted submissions.
//!
//! Two providers are supported:
//! - An HTTP email API taking a JSON payload and a bearer credential
//!   (Resend compatible)
//! - An SMTP relay with username/password authentication
//!
//! Exactly one provider call is made per submission, bounded by the
//! configured timeout. Provider error bodies are logged here and never
//! returned to the caller.

use crate::config::{MailConfig, MailProvider};
use crate::sanitize::{escape_html, message_to_html};
use crate::validator::ValidSubmission;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Dispatch failures.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Mail provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail provider timed out")]
    Timeout,

    #[error("Mail provider rejected message with status {status}")]
    Provider { status: u16 },
}

impl DispatchError {
    /// Whether the failure happened at the provider rather than before the call.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            DispatchError::Transport(_) | DispatchError::Timeout | DispatchError::Provider { .. }
        )
    }
}

/// Sanitized notification built from an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl OutboundMessage {
    /// Escape every user-supplied field and lay out the notification.
    pub fn compose(submission: &ValidSubmission, config: &MailConfig) -> Self {
        let name = escape_html(&submission.name);
        let email = escape_html(&submission.email);
        let message = message_to_html(&submission.message);

        let html = format!(
            "<h2>New contact form message</h2>\n\
             <p><strong>Name:</strong> {name}</p>\n\
             <p><strong>Email:</strong> {email}</p>\n\
             <p><strong>Message:</strong><br/>{message}</p>\n"
        );
        let text = format!(
            "Name: {}\nEmail: {}\n\n{}\n",
            submission.name, submission.email, submission.message
        );

        Self {
            from: config.from.clone(),
            to: config.to.clone(),
            reply_to: submission.email.clone(),
            subject: format!("{} {}", config.subject_prefix, name),
            html,
            text,
        }
    }
}

/// Delivers one outbound message.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError>;
}

/// Build the mailer selected by configuration.
pub fn build_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>, DispatchError> {
    match config.provider {
        MailProvider::HttpApi => Ok(Arc::new(HttpApiMailer::new(config)?)),
        MailProvider::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
    }
}

/// JSON email API client with bearer auth.
pub struct HttpApiMailer {
    api_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpApiMailer {
    pub fn new(config: &MailConfig) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DispatchError::Build(e.to_string()))?;

        Ok(Self {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            client,
        })
    }
}

#[async_trait]
impl Mailer for HttpApiMailer {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(DispatchError::NotConfigured("mail.api_key"))?;

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout
                } else {
                    DispatchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), detail = %detail, "Email API rejected message");
            return Err(DispatchError::Provider {
                status: status.as_u16(),
            });
        }

        debug!(status = status.as_u16(), "Email API accepted message");
        Ok(())
    }
}

/// SMTP relay client.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, DispatchError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::from_url(&config.smtp_url)
            .map_err(|e| DispatchError::Build(format!("invalid SMTP URL: {e}")))?
            .timeout(Some(config.timeout()));

        match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(pass)) => {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            _ => return Err(DispatchError::NotConfigured("mail.smtp_username/smtp_password")),
        }

        Ok(Self {
            transport: builder.build(),
            timeout: config.timeout(),
        })
    }

    /// Render the outbound message as a MIME message.
    pub fn build_message(message: &OutboundMessage) -> Result<Message, DispatchError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| DispatchError::Build(format!("sender: {e}")))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| DispatchError::Build(format!("recipient: {e}")))?;

        let mut builder = Message::builder().from(from).to(to).subject(&message.subject);
        if let Ok(reply_to) = message.reply_to.parse::<Mailbox>() {
            builder = builder.reply_to(reply_to);
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| DispatchError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DispatchError> {
        let email = Self::build_message(message)?;

        match tokio::time::timeout(self.timeout, self.transport.send(email)).await {
            Ok(Ok(response)) => {
                debug!(code = %response.code(), "SMTP relay accepted message");
                Ok(())
            }
            Ok(Err(e)) if e.is_timeout() => {
                error!(error = %e, "SMTP relay timed out");
                Err(DispatchError::Timeout)
            }
            Ok(Err(e)) => {
                error!(error = %e, "SMTP relay rejected message");
                Err(DispatchError::Transport(e.to_string()))
            }
            Err(_) => {
                error!(timeout = ?self.timeout, "SMTP relay timed out");
                Err(DispatchError::Timeout)
            }
        }
    }
}
