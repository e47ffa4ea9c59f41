//! Persistence for activities, bookings, participants and the email log.
//!
//! The workflow reaches the datastore only through [`BookingStore`]. The
//! operations that decide a booking's fate are conditional: the participant
//! increment checks status and capacity in the same statement that bumps the
//! counter, and every status change is a compare-and-swap on the current
//! status. Concurrent callers therefore see a serialized counter and at most
//! one of them wins each transition.

use crate::types::{
    Activity, ActivityId, BookingId, BookingParticipant, BookingRequest, BookingStatus,
    EmailLogEntry, ParticipantCount,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryBookingStore;
pub use postgres::PostgresBookingStore;

/// Largest participant count a booking can hold (the SQL column is `INTEGER`)
pub const MAX_PARTICIPANTS: u32 = u32::MAX >> 1;

/// Datastore errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No booking with this ID
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    /// The booking is confirmed or abandoned
    #[error("booking {booking_id} is {status} and no longer accepts participants")]
    BookingClosed {
        /// Booking
        booking_id: BookingId,
        /// Its terminal status
        status: BookingStatus,
    },

    /// The join would overflow the activity
    #[error("cannot add {requested} participants: {current} of {max} places taken")]
    CapacityExceeded {
        /// Seats asked for
        requested: u32,
        /// Seats already taken
        current: u32,
        /// Activity capacity
        max: u32,
    },

    /// Query or connection failure
    #[error("database error: {0}")]
    Database(String),

    /// A row could not be decoded into a domain type
    #[error("invalid row: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// A booking after a successful join
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinedBooking {
    /// Booking as updated by the increment
    pub booking: BookingRequest,
    /// Counter before and after
    pub count: ParticipantCount,
}

/// A payment window opened by [`BookingStore::mark_minimum_reached`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenedWindow {
    /// Booking with status and deadline applied
    pub booking: BookingRequest,
    /// Participant rows at the moment of the transition
    pub participants: Vec<BookingParticipant>,
}

/// Datastore operations used by the booking workflow
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Published activities ordered by date (undated last) then title,
    /// optionally filtered by a case-insensitive match on title or description
    async fn list_published_activities(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<Activity>, StoreError>;

    /// Any activity by ID, whatever its status
    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StoreError>;

    /// Insert a new booking together with the organizer's participant row
    async fn insert_booking(
        &self,
        booking: &BookingRequest,
        organizer: &BookingParticipant,
    ) -> Result<(), StoreError>;

    /// Load one booking
    async fn get_booking(&self, id: BookingId) -> Result<Option<BookingRequest>, StoreError>;

    /// Atomically add `participant.participants_count` to the booking's
    /// counter and insert the participant row
    ///
    /// Fails without changing anything when the booking is terminal or the
    /// new count would exceed `max_participants` (or [`MAX_PARTICIPANTS`]
    /// when the activity has no cap).
    async fn record_join(
        &self,
        participant: &BookingParticipant,
        max_participants: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<JoinedBooking, StoreError>;

    /// Participant rows in join order
    async fn list_participants(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<BookingParticipant>, StoreError>;

    /// `pending → minimum_reached` with the given deadline
    ///
    /// The participant rows are read atomically with the status change, so a
    /// join committed afterwards sees `minimum_reached` and is not in the
    /// snapshot. Returns `None` if the booking was not pending.
    async fn mark_minimum_reached(
        &self,
        booking_id: BookingId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<OpenedWindow>, StoreError>;

    /// Pending bookings whose count already meets their activity's minimum
    async fn list_stalled_quorums(&self) -> Result<Vec<BookingId>, StoreError>;

    /// `minimum_reached → confirmed`
    ///
    /// Returns the updated booking, or `None` if it was in another status.
    async fn confirm_booking(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingRequest>, StoreError>;

    /// `minimum_reached → abandoned` when the deadline is at or before `now`
    ///
    /// Returns the updated booking, or `None` if nothing changed.
    async fn abandon_if_expired(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingRequest>, StoreError>;

    /// Bookings still awaiting payment whose deadline has passed
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<BookingId>, StoreError>;

    /// Append an email delivery record
    async fn append_email_log(&self, entry: &EmailLogEntry) -> Result<(), StoreError>;

    /// Cheap connectivity check for readiness probes
    async fn ping(&self) -> Result<(), StoreError>;
}
