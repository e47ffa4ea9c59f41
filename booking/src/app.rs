//! Application context.
//!
//! [`BookingApp`] owns the workflow store and the read-side helpers. HTTP
//! handlers, the expiry sweeper and tests all go through it; nothing lives in
//! globals.

use crate::aggregates::{
    BookingAction, BookingEnvironment, BookingError, BookingReducer, BookingState, RequestOutcome,
};
use crate::calendar::BookingCalendar;
use crate::catalog::ActivityCatalog;
use crate::session::SessionUser;
use crate::share_link::ShareLinkHandler;
use crate::status_view::StatusView;
use crate::types::{ActivityId, BookingId, BookingRequest, RequestId};
use chrono::{DateTime, Utc};
use groupbook_runtime::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// The runtime store for the booking workflow
pub type WorkflowStore = Store<BookingState, BookingAction, BookingEnvironment, BookingReducer>;

/// Input for a new booking
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewBookingRequest {
    /// Activity to book
    pub activity_id: ActivityId,
    /// Chosen start
    pub requested_date_time: Option<DateTime<Utc>>,
    /// Seats for the organizer's group
    pub participants: u32,
}

/// A booking as the client sees it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookingDetails {
    /// Booking row
    pub booking: BookingRequest,
    /// Activity title
    pub activity_title: String,
    /// Quorum
    pub min_participants: u32,
    /// Capacity
    pub max_participants: Option<u32>,
    /// Badge, actions and copy
    pub status: StatusView,
    /// Share link, while the booking is still recruiting or awaiting payment
    pub share_url: Option<String>,
}

/// Everything a request handler needs
pub struct BookingApp {
    workflow: Arc<WorkflowStore>,
    catalog: ActivityCatalog,
    share_links: ShareLinkHandler,
    request_timeout: Duration,
}

impl BookingApp {
    /// Build the app around a workflow environment
    ///
    /// `request_timeout` bounds how long a command waits for its outcome.
    #[must_use]
    pub fn new(
        environment: BookingEnvironment,
        share_links: ShareLinkHandler,
        request_timeout: Duration,
    ) -> Self {
        let catalog = ActivityCatalog::new(Arc::clone(&environment.store));
        let workflow = Arc::new(Store::new(
            BookingState::new(),
            BookingReducer::new(),
            environment,
        ));

        Self {
            workflow,
            catalog,
            share_links,
            request_timeout,
        }
    }

    /// The workflow store
    #[must_use]
    pub fn workflow(&self) -> &Arc<WorkflowStore> {
        &self.workflow
    }

    /// Activity catalog
    #[must_use]
    pub const fn catalog(&self) -> &ActivityCatalog {
        &self.catalog
    }

    /// Share-link handler
    #[must_use]
    pub const fn share_links(&self) -> &ShareLinkHandler {
        &self.share_links
    }

    /// Bookable date rules
    #[must_use]
    pub fn calendar(&self) -> &BookingCalendar {
        &self.workflow.environment().calendar
    }

    /// Create a booking
    ///
    /// # Errors
    ///
    /// Returns the [`BookingError`] the workflow rejected the request with.
    #[tracing::instrument(skip(self, organizer, request), fields(activity_id = %request.activity_id))]
    pub async fn request_booking(
        &self,
        organizer: SessionUser,
        request: NewBookingRequest,
    ) -> Result<BookingDetails, BookingError> {
        let request_id = RequestId::new();
        let booking_id = self
            .execute(
                request_id,
                BookingAction::RequestBooking {
                    request_id,
                    booking_id: BookingId::new(),
                    activity_id: request.activity_id,
                    organizer,
                    requested_date_time: request.requested_date_time,
                    participants: request.participants,
                },
            )
            .await?;
        self.booking_details(booking_id).await
    }

    /// Join a booking
    ///
    /// # Errors
    ///
    /// Returns the [`BookingError`] the workflow rejected the join with.
    #[tracing::instrument(skip(self, user))]
    pub async fn join(
        &self,
        booking_id: BookingId,
        user: SessionUser,
        participants: u32,
    ) -> Result<BookingDetails, BookingError> {
        let request_id = RequestId::new();
        self.execute(
            request_id,
            BookingAction::JoinBooking {
                request_id,
                booking_id,
                user,
                participants,
            },
        )
        .await?;
        self.booking_details(booking_id).await
    }

    /// Mark a booking as paid
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidTransition`] unless the booking is awaiting
    /// payment.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, booking_id: BookingId) -> Result<BookingDetails, BookingError> {
        let request_id = RequestId::new();
        self.execute(
            request_id,
            BookingAction::ConfirmBooking {
                request_id,
                booking_id,
            },
        )
        .await?;
        self.booking_details(booking_id).await
    }

    /// Abandon the booking if its payment window has closed
    ///
    /// # Errors
    ///
    /// Returns [`BookingError`] if the runtime or datastore fails.
    pub async fn expire(&self, booking_id: BookingId) -> Result<BookingDetails, BookingError> {
        let mut handle = self
            .workflow
            .send(BookingAction::ExpireBooking { booking_id })
            .await?;
        handle.wait_with_timeout(self.request_timeout).await?;
        self.booking_details(booking_id).await
    }

    /// Load a booking with its view model
    ///
    /// # Errors
    ///
    /// [`BookingError::BookingNotFound`] for unknown IDs.
    pub async fn booking_details(&self, booking_id: BookingId) -> Result<BookingDetails, BookingError> {
        let env = self.workflow.environment();
        let booking = env
            .store
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        let activity = env
            .store
            .get_activity(booking.activity_id)
            .await?
            .ok_or(BookingError::ActivityNotFound(booking.activity_id))?;

        let status = StatusView::for_booking(&booking, activity.min_participants);
        let share_url = status.can_share.then(|| env.dispatcher.share_url(booking_id));

        Ok(BookingDetails {
            booking,
            activity_title: activity.title,
            min_participants: activity.min_participants,
            max_participants: activity.max_participants,
            status,
            share_url,
        })
    }

    /// Stop accepting commands and let running effects finish
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Unavailable`] if effects outlive `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), BookingError> {
        self.workflow.shutdown(timeout).await?;
        Ok(())
    }

    /// Send a command, wait for its cascade, and read its outcome
    async fn execute(&self, request_id: RequestId, action: BookingAction) -> Result<BookingId, BookingError> {
        let mut handle = self.workflow.send(action).await?;
        handle.wait_with_timeout(self.request_timeout).await?;

        match self
            .workflow
            .state(|s| s.outcome(&request_id).cloned())
            .await
        {
            Some(RequestOutcome::Accepted { booking_id }) => Ok(booking_id),
            Some(RequestOutcome::Rejected(error)) => Err(error),
            None => {
                tracing::error!(%request_id, "Workflow settled without an outcome");
                Err(BookingError::Unavailable("no outcome recorded".to_string()))
            },
        }
    }
}
