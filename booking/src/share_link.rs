//! Share-link handling.
//!
//! A share link is `<site origin>/?booking=<id>`. Opening one either shows
//! the join step for that booking, sends the visitor to login (remembering
//! the booking so [`ShareLinkHandler::resume`] can pick it up afterwards), or
//! reports the link as invalid.

use crate::notifications;
use crate::session::{PendingBookings, SessionUser};
use crate::status_view::StatusView;
use crate::store::{BookingStore, StoreError};
use crate::types::{Activity, BookingId, BookingRequest};
use serde::Serialize;
use std::sync::Arc;

/// Shown for unknown, malformed and closed booking links
pub const INVALID_LINK_MESSAGE: &str = "This booking link is invalid or has expired.";

/// Where login sends the visitor back to
pub const RESUME_PATH: &str = "/auth/resume";

/// The join step, pre-populated with the booking's current numbers
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JoinStep {
    /// Booking to join
    pub booking: BookingRequest,
    /// Activity title
    pub activity_title: String,
    /// Quorum
    pub min_participants: u32,
    /// Capacity
    pub max_participants: Option<u32>,
    /// Seats still free, `None` when unlimited
    pub remaining_places: Option<u32>,
    /// Status badge and copy
    pub status: StatusView,
    /// Link to pass on
    pub share_url: String,
}

/// Result of following a share link
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShareLinkOutcome {
    /// No `booking` parameter: regular page load
    NoLink,
    /// Visitor must sign in first; the booking ID has been remembered
    LoginRequired {
        /// Booking from the link
        booking_id: BookingId,
        /// Login page with the resume redirect
        login_url: String,
    },
    /// Open the join step
    Join(Box<JoinStep>),
    /// Link does not lead to a joinable booking
    Invalid {
        /// User-facing message
        message: &'static str,
    },
}

impl ShareLinkOutcome {
    const fn invalid() -> Self {
        Self::Invalid {
            message: INVALID_LINK_MESSAGE,
        }
    }
}

/// Resolves share links against the datastore
#[derive(Clone)]
pub struct ShareLinkHandler {
    store: Arc<dyn BookingStore>,
    site_origin: String,
    login_url: String,
}

impl ShareLinkHandler {
    /// Create a handler
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        site_origin: impl Into<String>,
        login_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            site_origin: site_origin.into().trim_end_matches('/').to_string(),
            login_url: login_url.into(),
        }
    }

    /// Follow a link's `booking` parameter
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the datastore cannot be read. Unknown
    /// bookings are not errors; they yield [`ShareLinkOutcome::Invalid`].
    #[tracing::instrument(skip(self, session, pending), fields(signed_in = session.is_some()))]
    pub async fn open(
        &self,
        booking_param: Option<&str>,
        session: Option<&SessionUser>,
        pending: &mut dyn PendingBookings,
    ) -> Result<ShareLinkOutcome, StoreError> {
        let Some(raw) = booking_param.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(ShareLinkOutcome::NoLink);
        };
        let Ok(booking_id) = raw.parse::<BookingId>() else {
            tracing::debug!(raw, "Malformed booking link");
            return Ok(ShareLinkOutcome::invalid());
        };

        let Some((booking, activity)) = self.load(booking_id).await? else {
            return Ok(ShareLinkOutcome::invalid());
        };

        if session.is_none() {
            pending.remember(booking_id);
            return Ok(ShareLinkOutcome::LoginRequired {
                booking_id,
                login_url: self.login_redirect(),
            });
        }

        Ok(ShareLinkOutcome::Join(Box::new(self.join_step(booking, &activity))))
    }

    /// Continue a share link after login
    ///
    /// Takes (and so clears) the remembered booking ID.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the datastore cannot be read.
    pub async fn resume(
        &self,
        session: &SessionUser,
        pending: &mut dyn PendingBookings,
    ) -> Result<ShareLinkOutcome, StoreError> {
        let Some(booking_id) = pending.take() else {
            return Ok(ShareLinkOutcome::NoLink);
        };
        tracing::debug!(%booking_id, user_id = %session.user_id, "Resuming share link");

        Ok(match self.load(booking_id).await? {
            Some((booking, activity)) => {
                ShareLinkOutcome::Join(Box::new(self.join_step(booking, &activity)))
            },
            None => ShareLinkOutcome::invalid(),
        })
    }

    fn login_redirect(&self) -> String {
        let separator = if self.login_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}redirect_to={}{RESUME_PATH}", self.login_url, self.site_origin)
    }

    /// Booking and activity, if the booking is still open
    async fn load(&self, booking_id: BookingId) -> Result<Option<(BookingRequest, Activity)>, StoreError> {
        let Some(booking) = self.store.get_booking(booking_id).await? else {
            return Ok(None);
        };
        if booking.status.is_terminal() {
            tracing::debug!(%booking_id, status = %booking.status, "Share link for closed booking");
            return Ok(None);
        }
        Ok(self
            .store
            .get_activity(booking.activity_id)
            .await?
            .map(|activity| (booking, activity)))
    }

    fn join_step(&self, booking: BookingRequest, activity: &Activity) -> JoinStep {
        JoinStep {
            status: StatusView::for_booking(&booking, activity.min_participants),
            share_url: notifications::share_url(&self.site_origin, booking.id),
            remaining_places: activity.remaining_capacity(booking.current_participants),
            activity_title: activity.title.clone(),
            min_participants: activity.min_participants,
            max_participants: activity.max_participants,
            booking,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::session::InMemoryPendingBookings;
    use crate::store::InMemoryBookingStore;
    use crate::types::{ActivityId, ActivityStatus, BookingParticipant, Money, ParticipantId, UserId};
    use chrono::Utc;

    async fn seeded() -> (ShareLinkHandler, BookingId) {
        let activity = Activity {
            id: ActivityId::new(),
            slug: "bats".to_string(),
            title: "Bat walk".to_string(),
            description: String::new(),
            price_per_person: Money::from_cents(500),
            credits_price: None,
            min_participants: 6,
            max_participants: Some(10),
            duration_minutes: None,
            date_time: None,
            location: None,
            featured_image: None,
            status: ActivityStatus::Published,
        };
        let store = Arc::new(InMemoryBookingStore::with_activities([activity.clone()]));
        let now = Utc::now();
        let booking = BookingRequest::new(BookingId::new(), activity.id, UserId::new(), now, 2, now);
        let organizer = BookingParticipant {
            id: ParticipantId::new(),
            booking_id: booking.id,
            user_id: booking.organizer_id,
            email: "o@example.com".to_string(),
            name: None,
            participants_count: 2,
            joined_at: now,
        };
        store.insert_booking(&booking, &organizer).await.unwrap();
        let handler = ShareLinkHandler::new(store, "https://visits.example", "https://visits.example/login");
        (handler, booking.id)
    }

    fn viewer() -> SessionUser {
        SessionUser {
            user_id: UserId::new(),
            email: "v@example.com".to_string(),
            name: None,
        }
    }

    #[tokio::test]
    async fn no_parameter_is_a_plain_visit() {
        let (handler, _) = seeded().await;
        let mut pending = InMemoryPendingBookings::new();
        let outcome = handler.open(None, None, &mut pending).await.unwrap();
        assert_eq!(outcome, ShareLinkOutcome::NoLink);
    }

    #[tokio::test]
    async fn signed_in_visitor_gets_the_join_step() {
        let (handler, id) = seeded().await;
        let mut pending = InMemoryPendingBookings::new();
        let raw = id.to_string();

        let outcome = handler.open(Some(&raw), Some(&viewer()), &mut pending).await.unwrap();

        let ShareLinkOutcome::Join(step) = outcome else {
            panic!("expected join step, got {outcome:?}");
        };
        assert_eq!(step.booking.current_participants, 2);
        assert_eq!(step.remaining_places, Some(8));
        assert_eq!(step.share_url, format!("https://visits.example/?booking={id}"));
        assert!(pending.peek().is_none());
    }

    #[tokio::test]
    async fn login_redirect_points_back_to_resume() {
        let (handler, id) = seeded().await;
        let mut pending = InMemoryPendingBookings::new();
        let raw = id.to_string();

        let outcome = handler.open(Some(&raw), None, &mut pending).await.unwrap();

        assert_eq!(
            outcome,
            ShareLinkOutcome::LoginRequired {
                booking_id: id,
                login_url: "https://visits.example/login?redirect_to=https://visits.example/auth/resume"
                    .to_string(),
            }
        );
        assert_eq!(pending.peek(), Some(id));
    }

    #[tokio::test]
    async fn resume_without_pending_booking_is_a_plain_visit() {
        let (handler, _) = seeded().await;
        let mut pending = InMemoryPendingBookings::new();
        let outcome = handler.resume(&viewer(), &mut pending).await.unwrap();
        assert_eq!(outcome, ShareLinkOutcome::NoLink);
    }

    #[tokio::test]
    async fn malformed_id_is_invalid() {
        let (handler, _) = seeded().await;
        let mut pending = InMemoryPendingBookings::new();
        let outcome = handler.open(Some("not-a-uuid"), None, &mut pending).await.unwrap();
        assert_eq!(
            outcome,
            ShareLinkOutcome::Invalid {
                message: INVALID_LINK_MESSAGE
            }
        );
        assert!(pending.peek().is_none());
    }
}
