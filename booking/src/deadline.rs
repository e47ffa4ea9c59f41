//! Payment deadline setter.
//!
//! Runs at the pending → minimum_reached transition. The datastore update is
//! conditional on the booking still being pending, so when several joins
//! cross the quorum concurrently exactly one caller wins, and only the
//! winner goes on to send payment emails. The winner also gets the participant
//! rows as they stood at the transition, so nobody is emailed twice.

use crate::store::{BookingStore, StoreError};
use crate::types::{BookingId, BookingParticipant, BookingRequest};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Result of a deadline attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeadlineOutcome {
    /// This caller moved the booking to `minimum_reached`
    Set {
        /// Booking with status and deadline applied
        booking: BookingRequest,
        /// Participant rows at the moment of the transition
        participants: Vec<BookingParticipant>,
    },
    /// The booking had already left `pending`; its deadline is untouched
    AlreadyTransitioned,
}

/// Stamps the payment deadline once per booking
#[derive(Clone)]
pub struct PaymentDeadlineSetter {
    store: Arc<dyn BookingStore>,
    window: Duration,
}

impl PaymentDeadlineSetter {
    /// Create a setter with the given payment window
    #[must_use]
    pub fn new(store: Arc<dyn BookingStore>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Length of the payment window
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Try to open the payment window for `booking_id`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the datastore update fails.
    pub async fn set(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<DeadlineOutcome, StoreError> {
        let deadline = now + self.window;

        match self.store.mark_minimum_reached(booking_id, deadline, now).await? {
            Some(window) => {
                tracing::info!(
                    %booking_id,
                    %deadline,
                    participants = window.participants.len(),
                    "Payment window opened"
                );
                metrics::counter!("bookings.quorum_reached").increment(1);
                Ok(DeadlineOutcome::Set {
                    booking: window.booking,
                    participants: window.participants,
                })
            },
            None => {
                tracing::debug!(%booking_id, "Quorum transition already applied");
                Ok(DeadlineOutcome::AlreadyTransitioned)
            },
        }
    }
}
