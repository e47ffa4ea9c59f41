//! Status UI view model.
//!
//! Maps a booking's status onto what the booking modal shows: a badge, which
//! actions are offered and the "next steps" copy.

use crate::notifications::templates::format_when;
use crate::quorum::{self, QuorumStatus};
use crate::types::{BookingRequest, BookingStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What the client renders for a booking
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusView {
    /// Underlying status
    pub status: BookingStatus,
    /// Badge label
    pub badge_text: String,
    /// Badge CSS class
    pub badge_class: &'static str,
    /// Show the join button
    pub can_join: bool,
    /// Show the share link
    pub can_share: bool,
    /// Show the pay button
    pub can_pay: bool,
    /// Guidance for the viewer
    pub next_steps: String,
    /// Formatted payment deadline, when one is set
    pub deadline_text: Option<String>,
}

impl StatusView {
    /// View for a booking, using the activity's quorum for the recruiting copy
    #[must_use]
    pub fn for_booking(booking: &BookingRequest, min_participants: u32) -> Self {
        let missing = match quorum::evaluate(booking.current_participants, min_participants) {
            QuorumStatus::Met => 0,
            QuorumStatus::Unmet { missing } => missing,
        };
        Self::render(booking.status, booking.payment_deadline, missing)
    }

    /// View for a bare status
    #[must_use]
    pub fn render(status: BookingStatus, deadline: Option<DateTime<Utc>>, missing: u32) -> Self {
        let deadline_text = deadline.map(format_when);

        match status {
            BookingStatus::Pending => Self {
                status,
                badge_text: "Recruiting".to_string(),
                badge_class: "badge-recruiting",
                can_join: true,
                can_share: true,
                can_pay: false,
                next_steps: match missing {
                    0 => "The minimum has been reached. Payment details are on their way.".to_string(),
                    1 => "1 more participant is needed. Share the link to invite others.".to_string(),
                    n => format!("{n} more participants are needed. Share the link to invite others."),
                },
                deadline_text,
            },
            BookingStatus::MinimumReached => Self {
                status,
                badge_text: "Payment required".to_string(),
                badge_class: "badge-payment-required",
                can_join: true,
                can_share: true,
                can_pay: true,
                next_steps: deadline_text.as_ref().map_or_else(
                    || "The minimum has been reached. Please complete payment.".to_string(),
                    |d| format!("The minimum has been reached. Please complete payment before {d}."),
                ),
                deadline_text,
            },
            BookingStatus::Confirmed => Self {
                status,
                badge_text: "Confirmed".to_string(),
                badge_class: "badge-confirmed",
                can_join: false,
                can_share: false,
                can_pay: false,
                next_steps: "Your visit is confirmed. See you there!".to_string(),
                deadline_text,
            },
            BookingStatus::Abandoned => Self {
                status,
                badge_text: "Expired".to_string(),
                badge_class: "badge-expired",
                can_join: false,
                can_share: false,
                can_pay: false,
                next_steps: "The payment window closed before payment was completed. \
                             You can request a new booking from the catalog."
                    .to_string(),
                deadline_text,
            },
        }
    }
}
