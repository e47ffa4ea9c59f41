//! Sessions and client-side pending state.
//!
//! Authentication is delegated to the hosted auth service; this module only
//! resolves an access token to a [`SessionUser`]. [`PendingBookings`] models
//! the client-local slot that carries a share-link booking ID across the
//! login redirect.

use crate::types::{BookingId, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// The authenticated caller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Auth provider user ID
    pub user_id: UserId,
    /// Verified email address
    pub email: String,
    /// Display name, if the profile has one
    pub name: Option<String>,
}

/// Session resolution failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Token unknown, expired or revoked
    #[error("invalid or expired session")]
    InvalidToken,

    /// The auth service could not be reached or answered oddly
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves access tokens to users
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Look up the user behind `token`
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidToken`] when the token is not accepted,
    /// [`SessionError::Unavailable`] on transport problems.
    async fn resolve(&self, token: &str) -> Result<SessionUser, SessionError>;
}

/// Resolver backed by the hosted auth service's `GET /auth/v1/user`
#[derive(Clone, Debug)]
pub struct BaasSessionResolver {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Deserialize)]
struct BaasUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: HashMap<String, serde_json::Value>,
}

impl BaasSessionResolver {
    /// Create a resolver for the service at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, anon_key: String, timeout: Duration) -> Result<Self, SessionError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }
}

#[async_trait]
impl SessionResolver for BaasSessionResolver {
    async fn resolve(&self, token: &str) -> Result<SessionUser, SessionError> {
        let response = self
            .http_client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SessionError::InvalidToken);
        }
        if !status.is_success() {
            tracing::warn!(status = %status, "Auth service rejected user lookup");
            return Err(SessionError::Unavailable(format!("status {status}")));
        }

        let user: BaasUser = response
            .json()
            .await
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        let email = user.email.ok_or(SessionError::InvalidToken)?;
        let name = ["full_name", "name"]
            .iter()
            .find_map(|k| user.user_metadata.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string);

        Ok(SessionUser {
            user_id: UserId::from_uuid(user.id),
            email,
            name,
        })
    }
}

/// Fixed token table. For tests and local development.
#[derive(Clone, Debug, Default)]
pub struct StaticSessionResolver {
    tokens: HashMap<String, SessionUser>,
}

impl StaticSessionResolver {
    /// Empty table: every token is rejected
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as `user`
    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user: SessionUser) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl SessionResolver for StaticSessionResolver {
    async fn resolve(&self, token: &str) -> Result<SessionUser, SessionError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(SessionError::InvalidToken)
    }
}

/// Client-local slot remembering a share-link booking across login
pub trait PendingBookings: Send {
    /// Remember `booking_id`, replacing anything stored
    fn remember(&mut self, booking_id: BookingId);

    /// Return and clear the stored booking ID
    fn take(&mut self) -> Option<BookingId>;
}

/// [`PendingBookings`] held in a plain field
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryPendingBookings {
    slot: Option<BookingId>,
}

impl InMemoryPendingBookings {
    /// Empty slot
    #[must_use]
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Peek without clearing
    #[must_use]
    pub const fn peek(&self) -> Option<BookingId> {
        self.slot
    }
}

impl PendingBookings for InMemoryPendingBookings {
    fn remember(&mut self, booking_id: BookingId) {
        self.slot = Some(booking_id);
    }

    fn take(&mut self) -> Option<BookingId> {
        self.slot.take()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_resolver_knows_only_its_tokens() {
        let user = SessionUser {
            user_id: UserId::new(),
            email: "ana@example.com".to_string(),
            name: Some("Ana".to_string()),
        };
        let resolver = StaticSessionResolver::new().with_user("t1", user.clone());

        assert_eq!(resolver.resolve("t1").await.unwrap(), user);
        assert_eq!(resolver.resolve("t2").await.unwrap_err(), SessionError::InvalidToken);
    }

    #[test]
    fn pending_slot_is_cleared_on_take() {
        let mut pending = InMemoryPendingBookings::new();
        let id = BookingId::new();
        pending.remember(id);
        assert_eq!(pending.take(), Some(id));
        assert_eq!(pending.take(), None);
    }
}
