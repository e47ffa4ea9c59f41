//! HTTP error responses.
//!
//! Domain errors are converted into an [`AppError`] carrying a status, a
//! stable code for clients, and a user-facing message. Server errors are
//! logged with their source when turned into a response.

use crate::aggregates::BookingError;
use crate::session::SessionError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Error returned by handlers
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Build an error
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error for logging
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 400
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 401
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 403
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    /// 404
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// 500 with a generic message; the detail goes to the log only
    #[must_use]
    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "An internal error occurred",
        )
        .with_source(source)
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Client-facing code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(status = %self.status, code = self.code, "Request failed"),
            }
        }

        let body = ErrorBody {
            code: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::ActivityNotFound(_) | BookingError::BookingNotFound(_) => {
                Self::not_found(message)
            },
            BookingError::ActivityUnavailable(_) => {
                Self::new(StatusCode::CONFLICT, "ACTIVITY_UNAVAILABLE", message)
            },
            BookingError::MissingDateTime | BookingError::InvalidParticipantCount => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", message)
            },
            BookingError::DateNotBookable(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "DATE_NOT_BOOKABLE", message)
            },
            BookingError::CapacityExceeded { .. } => {
                Self::new(StatusCode::CONFLICT, "CAPACITY_EXCEEDED", message)
            },
            BookingError::BookingClosed { .. } => Self::new(StatusCode::CONFLICT, "BOOKING_CLOSED", message),
            BookingError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "INVALID_TRANSITION", message)
            },
            BookingError::Timeout => Self::new(StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", message),
            BookingError::Unavailable(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
            },
            BookingError::Storage(_) => Self::internal(err),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::from(BookingError::from(err))
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken => Self::unauthorized(err.to_string()),
            SessionError::Unavailable(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "AUTH_UNAVAILABLE", "Sign-in is unavailable")
                    .with_source(err)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BookingId, BookingStatus};

    #[test]
    fn display_includes_code() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn booking_errors_map_to_statuses() {
        let closed = AppError::from(BookingError::BookingClosed {
            booking_id: BookingId::new(),
            status: BookingStatus::Abandoned,
        });
        assert_eq!(closed.status(), StatusCode::CONFLICT);
        assert_eq!(closed.code(), "BOOKING_CLOSED");

        let storage = AppError::from(BookingError::Storage("pool timed out".to_string()));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.to_string(), "[INTERNAL_SERVER_ERROR] An internal error occurred");

        let timeout = AppError::from(BookingError::Timeout);
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn invalid_session_is_unauthorized() {
        let err = AppError::from(SessionError::InvalidToken);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
