//! Domain types for group bookings.
//!
//! Identifiers, money, the booking status machine and the rows the workflow
//! reads and writes: activities, booking requests, participants and the
//! email delivery log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an activity
    ActivityId
);
uuid_id!(
    /// Unique identifier for a booking request
    BookingId
);
uuid_id!(
    /// Unique identifier for a participant row
    ParticipantId
);
uuid_id!(
    /// Identifier of an authenticated user, as issued by the auth provider
    UserId
);
uuid_id!(
    /// Correlates a command sent to the store with its outcome
    RequestId
);

// ============================================================================
// Money
// ============================================================================

/// An amount in euro cents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Price for `count` people, saturating on overflow
    #[must_use]
    pub fn times(self, count: u32) -> Self {
        Self(self.0.saturating_mul(u64::from(count)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "€{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Error returned when a stored status string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Publication state of an activity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Being edited, not listed
    Draft,
    /// Listed in the catalog and bookable
    Published,
    /// No longer offered
    Archived,
}

impl ActivityStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl FromStr for ActivityStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            other => Err(UnknownVariant::new("activity status", other)),
        }
    }
}

/// Booking lifecycle
///
/// ```text
/// pending ──quorum──▶ minimum_reached ──paid──▶ confirmed
///                           │
///                           └──deadline passed──▶ abandoned
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Recruiting participants, quorum not yet reached
    Pending,
    /// Quorum reached, payment window open
    MinimumReached,
    /// All participants paid
    Confirmed,
    /// Payment window closed unpaid
    Abandoned,
}

impl BookingStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::MinimumReached => "minimum_reached",
            Self::Confirmed => "confirmed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Confirmed and abandoned bookings never change again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Abandoned)
    }

    /// Whether new participants may still join
    #[must_use]
    pub const fn accepts_participants(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "minimum_reached" => Ok(Self::MinimumReached),
            "confirmed" => Ok(Self::Confirmed),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(UnknownVariant::new("booking status", other)),
        }
    }
}

/// The three emails the workflow sends
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    /// Sent to the organizer while the quorum is unmet, carries the share link
    Recruitment,
    /// Sent to each participant once the quorum is reached
    PaymentRequired,
    /// Sent to the organization's admin address
    MinimumReached,
}

impl EmailType {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recruitment => "recruitment",
            Self::PaymentRequired => "payment_required",
            Self::MinimumReached => "minimum_reached",
        }
    }
}

impl fmt::Display for EmailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recruitment" => Ok(Self::Recruitment),
            "payment_required" => Ok(Self::PaymentRequired),
            "minimum_reached" => Ok(Self::MinimumReached),
            other => Err(UnknownVariant::new("email type", other)),
        }
    }
}

/// Result of a delivery attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted by the email provider
    Sent,
    /// Provider call failed
    Failed,
}

impl DeliveryStatus {
    /// Database representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant::new("delivery status", other)),
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

/// A bookable activity or visit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity ID
    pub id: ActivityId,
    /// URL slug
    pub slug: String,
    /// Display title
    pub title: String,
    /// Long description
    pub description: String,
    /// Price per participant
    pub price_per_person: Money,
    /// Optional price in GREENs credits
    pub credits_price: Option<u32>,
    /// Quorum: participants needed for the session to go ahead
    pub min_participants: u32,
    /// Capacity, `None` for unlimited
    pub max_participants: Option<u32>,
    /// Length of the session
    pub duration_minutes: Option<u32>,
    /// Fixed date for scheduled activities
    pub date_time: Option<DateTime<Utc>>,
    /// Where it happens
    pub location: Option<String>,
    /// Card image URL
    pub featured_image: Option<String>,
    /// Publication state
    pub status: ActivityStatus,
}

impl Activity {
    /// Seats left given the current participant count, `None` when unlimited
    #[must_use]
    pub fn remaining_capacity(&self, current: u32) -> Option<u32> {
        self.max_participants.map(|max| max.saturating_sub(current))
    }
}

/// A group booking request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Booking ID
    pub id: BookingId,
    /// Activity being booked
    pub activity_id: ActivityId,
    /// User who created the request
    pub organizer_id: UserId,
    /// Requested session start
    pub requested_date_time: DateTime<Utc>,
    /// Participants the organizer booked for
    pub participants_requested: u32,
    /// Sum of all participant rows
    pub current_participants: u32,
    /// Lifecycle state
    pub status: BookingStatus,
    /// End of the payment window, set once when the quorum is reached
    pub payment_deadline: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl BookingRequest {
    /// A fresh pending booking
    #[must_use]
    pub const fn new(
        id: BookingId,
        activity_id: ActivityId,
        organizer_id: UserId,
        requested_date_time: DateTime<Utc>,
        participants: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            activity_id,
            organizer_id,
            requested_date_time,
            participants_requested: participants,
            current_participants: participants,
            status: BookingStatus::Pending,
            payment_deadline: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One person's reservation within a booking
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingParticipant {
    /// Participant row ID
    pub id: ParticipantId,
    /// Booking joined
    pub booking_id: BookingId,
    /// Who joined
    pub user_id: UserId,
    /// Where notifications go
    pub email: String,
    /// Display name, if known
    pub name: Option<String>,
    /// Seats taken by this participant
    pub participants_count: u32,
    /// Join timestamp
    pub joined_at: DateTime<Utc>,
}

/// Counter values around an atomic increment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantCount {
    /// Count before this join
    pub previous: u32,
    /// Count after this join
    pub current: u32,
}

/// Audit row for one email attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailLogEntry {
    /// Row ID
    pub id: Uuid,
    /// Booking the email was about
    pub booking_id: BookingId,
    /// Participant it was addressed to, `None` for admin mail
    pub participant_id: Option<ParticipantId>,
    /// Which template
    pub email_type: EmailType,
    /// Recipient address
    pub recipient: String,
    /// ID assigned by the provider on success
    pub provider_message_id: Option<String>,
    /// Outcome
    pub status: DeliveryStatus,
    /// Provider error on failure
    pub error: Option<String>,
    /// Attempt timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn money_formats_as_euros() {
        assert_eq!(Money::from_cents(1250).to_string(), "€12.50");
        assert_eq!(Money::from_cents(5).to_string(), "€0.05");
        assert_eq!(Money::from_cents(1250).times(3), Money::from_cents(3750));
    }

    #[test]
    fn booking_status_round_trips_through_strings() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::MinimumReached,
            BookingStatus::Confirmed,
            BookingStatus::Abandoned,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("recruiting".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn only_confirmed_and_abandoned_are_terminal() {
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::MinimumReached.is_terminal());
        assert!(BookingStatus::Confirmed.is_terminal());
        assert!(BookingStatus::Abandoned.is_terminal());
    }

    #[test]
    fn ids_parse_and_serialize_as_plain_uuids() {
        let id = BookingId::new();
        assert_eq!(id.to_string().parse::<BookingId>().unwrap(), id);
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{id}\""));
        assert!("not-a-uuid".parse::<BookingId>().is_err());
    }
}
