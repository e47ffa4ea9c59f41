//! Email delivery providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// An email ready to hand to a provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
    /// Provider tags (name, value) for delivery analytics
    pub tags: Vec<(String, String)>,
}

/// Delivery failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The request never completed
    #[error("email transport error: {0}")]
    Transport(String),

    /// The provider answered with an error
    #[error("email provider rejected the message ({status}): {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Provider message
        message: String,
    },

    /// The provider answered with something unexpected
    #[error("unexpected email provider response: {0}")]
    InvalidResponse(String),
}

/// Email provider.
///
/// Abstracts over transactional email services.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send one message
    ///
    /// Returns the provider-assigned message ID.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] if the provider cannot be reached or rejects
    /// the message.
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError>;
}

// ============================================================================
// Resend
// ============================================================================

/// Resend HTTP API provider (`POST /emails` with a bearer key)
#[derive(Clone, Debug)]
pub struct ResendEmailProvider {
    http_client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    tags: Vec<ResendTag<'a>>,
}

#[derive(Serialize)]
struct ResendTag<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: String,
}

#[derive(Deserialize)]
struct ResendErrorBody {
    message: Option<String>,
}

impl ResendEmailProvider {
    /// Default API endpoint
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.resend.com/emails";

    /// Create a provider sending from `from`
    ///
    /// # Errors
    ///
    /// Returns [`EmailError::Transport`] if the HTTP client cannot be built.
    pub fn new(api_key: String, from: String, timeout: Duration) -> Result<Self, EmailError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            from,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Point at a different endpoint (test servers, regional hosts)
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl EmailProvider for ResendEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        let body = ResendRequest {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            tags: message
                .tags
                .iter()
                .map(|(name, value)| ResendTag {
                    name: name.as_str(),
                    value: value.as_str(),
                })
                .collect(),
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ResendErrorBody>()
                .await
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ResendResponse = response
            .json()
            .await
            .map_err(|e| EmailError::InvalidResponse(e.to_string()))?;

        Ok(parsed.id)
    }
}

// ============================================================================
// Console
// ============================================================================

/// Logs emails instead of sending them. For development.
#[derive(Debug, Default)]
pub struct ConsoleEmailProvider {
    sent: AtomicU64,
}

impl ConsoleEmailProvider {
    /// Create a new console email provider.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl EmailProvider for ConsoleEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("console-{n}");

        info!(
            to = %message.to,
            subject = %message.subject,
            message_id = %id,
            "📧 Email (Development Mode)"
        );
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║ To: {:<57}║", message.to);
        println!("║ Subject: {:<52}║", message.subject);
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        Ok(id)
    }
}

// ============================================================================
// Recording
// ============================================================================

/// Keeps every message in memory; can be switched to fail. For tests.
#[derive(Debug, Default)]
pub struct RecordingEmailProvider {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingEmailProvider {
    /// Create a provider that accepts everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages accepted so far
    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EmailProvider for RecordingEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmailError::Rejected {
                status: 503,
                message: "recording provider set to fail".to_string(),
            });
        }

        let mut sent = self
            .sent
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sent.push(message.clone());
        Ok(format!("rec-{}", sent.len()))
    }
}
