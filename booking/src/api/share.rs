//! Share-link entry points.
//!
//! - GET /?booking=<id> - follow a share link
//! - GET /auth/resume - continue a share link after login
//!
//! The booking ID survives the login redirect in the `pending_booking`
//! cookie.

use super::error::AppError;
use super::extractors::{cookie, MaybeUser};
use crate::server::state::AppState;
use crate::session::PendingBookings;
use crate::share_link::{JoinStep, ShareLinkOutcome};
use crate::types::BookingId;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Cookie holding the booking ID across login
pub const PENDING_BOOKING_COOKIE: &str = "pending_booking";

const PENDING_BOOKING_MAX_AGE: u32 = 3600;

/// Query parameters of a share link
#[derive(Debug, Default, Deserialize)]
pub struct ShareLinkQuery {
    /// Booking ID
    pub booking: Option<String>,
}

/// JSON body of a share-link response
#[derive(Debug, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ShareLinkResponse {
    /// No link: show the catalog
    Catalog,
    /// Show the join step
    Join {
        /// Booking numbers and status
        join: Box<JoinStep>,
    },
}

#[derive(Serialize)]
struct InvalidLinkBody {
    message: &'static str,
}

/// [`PendingBookings`] backed by the `pending_booking` cookie
#[derive(Debug, Default)]
pub struct CookiePendingBookings {
    slot: Option<BookingId>,
    changed: bool,
}

impl CookiePendingBookings {
    /// Read the cookie from a request
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            slot: cookie(headers, PENDING_BOOKING_COOKIE).and_then(|v| v.parse().ok()),
            changed: false,
        }
    }

    /// `Set-Cookie` value for the response, if the slot changed
    #[must_use]
    pub fn set_cookie(&self) -> Option<HeaderValue> {
        if !self.changed {
            return None;
        }
        let value = match self.slot {
            Some(id) => format!(
                "{PENDING_BOOKING_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={PENDING_BOOKING_MAX_AGE}"
            ),
            None => format!("{PENDING_BOOKING_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
        };
        HeaderValue::from_str(&value).ok()
    }
}

impl PendingBookings for CookiePendingBookings {
    fn remember(&mut self, booking_id: BookingId) {
        self.slot = Some(booking_id);
        self.changed = true;
    }

    fn take(&mut self) -> Option<BookingId> {
        let taken = self.slot.take();
        if taken.is_some() {
            self.changed = true;
        }
        taken
    }
}

/// Follow a share link
pub async fn open_share_link(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<ShareLinkQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let mut pending = CookiePendingBookings::from_headers(&headers);
    let outcome = state
        .app
        .share_links()
        .open(query.booking.as_deref(), user.as_ref(), &mut pending)
        .await?;

    if matches!(outcome, ShareLinkOutcome::Join(_) | ShareLinkOutcome::Invalid { .. }) {
        // Joining now, or the link leads nowhere: nothing left to resume
        pending.take();
    }

    Ok(respond(outcome, &pending))
}

/// Continue after login
pub async fn resume_share_link(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(user) = user else {
        return Err(AppError::unauthorized("Sign in to continue"));
    };

    let mut pending = CookiePendingBookings::from_headers(&headers);
    let outcome = state.app.share_links().resume(&user, &mut pending).await?;

    Ok(respond(outcome, &pending))
}

fn respond(outcome: ShareLinkOutcome, pending: &CookiePendingBookings) -> Response {
    let mut response = match outcome {
        ShareLinkOutcome::NoLink => Json(ShareLinkResponse::Catalog).into_response(),
        ShareLinkOutcome::LoginRequired { login_url, .. } => Redirect::to(&login_url).into_response(),
        ShareLinkOutcome::Join(join) => Json(ShareLinkResponse::Join { join }).into_response(),
        ShareLinkOutcome::Invalid { message } => {
            (StatusCode::NOT_FOUND, Json(InvalidLinkBody { message })).into_response()
        },
    };

    if let Some(value) = pending.set_cookie() {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn remembered_booking_sets_cookie() {
        let mut pending = CookiePendingBookings::default();
        assert!(pending.set_cookie().is_none());

        let id = BookingId::new();
        pending.remember(id);
        let value = pending.set_cookie().unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with(&format!("pending_booking={id};")));
        assert!(value.contains("Max-Age=3600"));
    }

    #[test]
    fn taking_clears_cookie() {
        let id = BookingId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("pending_booking={id}")).unwrap(),
        );
        let mut pending = CookiePendingBookings::from_headers(&headers);

        assert_eq!(pending.take(), Some(id));
        let cleared = pending.set_cookie().unwrap();
        assert!(cleared.to_str().unwrap().contains("Max-Age=0"));
    }
}
