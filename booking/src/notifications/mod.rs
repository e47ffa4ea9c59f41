//! Notification dispatch.
//!
//! Composes a booking email, hands it to the configured [`EmailProvider`]
//! and appends an [`EmailLogEntry`] for every attempt. Delivery failures are
//! logged and swallowed: a booking that reached its quorum stays that way
//! even if nobody could be told.

pub mod providers;
pub mod templates;

pub use providers::{
    ConsoleEmailProvider, EmailError, EmailMessage, EmailProvider, RecordingEmailProvider,
    ResendEmailProvider,
};

use crate::store::BookingStore;
use crate::types::{
    Activity, BookingId, BookingParticipant, BookingRequest, DeliveryStatus, EmailLogEntry,
    EmailType, ParticipantId,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use templates::TemplateContext;
use uuid::Uuid;

/// Who an email goes to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    /// Address
    pub email: String,
    /// Greeting name
    pub name: Option<String>,
    /// Participant row, when addressed to a participant
    pub participant_id: Option<ParticipantId>,
    /// Seats the recipient holds
    pub seats: Option<u32>,
}

impl Recipient {
    /// Address a participant row
    #[must_use]
    pub fn participant(p: &BookingParticipant) -> Self {
        Self {
            email: p.email.clone(),
            name: p.name.clone(),
            participant_id: Some(p.id),
            seats: Some(p.participants_count),
        }
    }

    /// Address a bare email (admin)
    #[must_use]
    pub fn address(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            participant_id: None,
            seats: None,
        }
    }
}

/// One email to send
#[derive(Clone, Debug)]
pub struct Notification {
    /// Template
    pub kind: EmailType,
    /// Booking snapshot to interpolate
    pub booking: BookingRequest,
    /// Activity snapshot to interpolate
    pub activity: Activity,
    /// Addressee
    pub recipient: Recipient,
}

/// What happened to a notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Booking the email was about
    pub booking_id: BookingId,
    /// Template
    pub kind: EmailType,
    /// Addressee
    pub recipient: String,
    /// Whether the provider accepted it
    pub delivered: bool,
}

/// Sends booking emails and records every attempt
pub struct NotificationDispatcher {
    provider: Arc<dyn EmailProvider>,
    store: Arc<dyn BookingStore>,
    site_origin: String,
    admin_email: Option<String>,
}

impl NotificationDispatcher {
    /// Create a dispatcher
    ///
    /// `site_origin` is the public origin share links are built from.
    #[must_use]
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        store: Arc<dyn BookingStore>,
        site_origin: impl Into<String>,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            provider,
            store,
            site_origin: site_origin.into().trim_end_matches('/').to_string(),
            admin_email: admin_email.filter(|e| !e.trim().is_empty()),
        }
    }

    /// `<origin>/?booking=<id>`
    #[must_use]
    pub fn share_url(&self, booking_id: BookingId) -> String {
        share_url(&self.site_origin, booking_id)
    }

    /// The organization address that receives `minimum_reached` emails
    #[must_use]
    pub fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }

    /// Render, send and log one notification
    ///
    /// Never fails: provider and log errors are reported through tracing.
    #[tracing::instrument(
        skip(self, notification, now),
        fields(booking_id = %notification.booking.id, kind = %notification.kind)
    )]
    pub async fn dispatch(&self, notification: Notification, now: DateTime<Utc>) -> DeliveryReport {
        let Notification {
            kind,
            booking,
            activity,
            recipient,
        } = notification;

        let share_url = self.share_url(booking.id);
        let rendered = templates::render(
            kind,
            &TemplateContext {
                booking: &booking,
                activity: &activity,
                recipient_name: recipient.name.as_deref(),
                recipient_seats: recipient.seats,
                share_url: (kind == EmailType::Recruitment).then_some(share_url.as_str()),
            },
        );

        let message = EmailMessage {
            to: recipient.email.clone(),
            subject: rendered.subject,
            html: rendered.html,
            tags: vec![
                ("category".to_string(), kind.as_str().to_string()),
                ("booking_id".to_string(), booking.id.to_string()),
            ],
        };

        let (status, provider_message_id, error) = match self.provider.send(&message).await {
            Ok(id) => {
                tracing::info!(to = %recipient.email, message_id = %id, "Email sent");
                metrics::counter!("notifications.sent", "type" => kind.as_str()).increment(1);
                (DeliveryStatus::Sent, Some(id), None)
            },
            Err(e) => {
                tracing::error!(to = %recipient.email, error = %e, "Email delivery failed");
                metrics::counter!("notifications.failed", "type" => kind.as_str()).increment(1);
                (DeliveryStatus::Failed, None, Some(e.to_string()))
            },
        };

        let entry = EmailLogEntry {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            participant_id: recipient.participant_id,
            email_type: kind,
            recipient: recipient.email.clone(),
            provider_message_id,
            status,
            error,
            created_at: now,
        };
        if let Err(e) = self.store.append_email_log(&entry).await {
            tracing::warn!(error = %e, "Failed to append email log entry");
        }

        DeliveryReport {
            booking_id: booking.id,
            kind,
            recipient: recipient.email,
            delivered: status == DeliveryStatus::Sent,
        }
    }
}

/// Build a share link from an origin and a booking ID
#[must_use]
pub fn share_url(origin: &str, booking_id: BookingId) -> String {
    format!("{}/?booking={booking_id}", origin.trim_end_matches('/'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::InMemoryBookingStore;
    use crate::types::{ActivityId, ActivityStatus, Money, UserId};

    fn fixtures() -> (BookingRequest, Activity) {
        let now = Utc::now();
        let activity = Activity {
            id: ActivityId::new(),
            slug: "orchard".to_string(),
            title: "Orchard walk".to_string(),
            description: String::new(),
            price_per_person: Money::from_cents(800),
            credits_price: None,
            min_participants: 5,
            max_participants: None,
            duration_minutes: None,
            date_time: None,
            location: None,
            featured_image: None,
            status: ActivityStatus::Published,
        };
        let booking = BookingRequest::new(BookingId::new(), activity.id, UserId::new(), now, 2, now);
        (booking, activity)
    }

    #[test]
    fn share_url_ignores_trailing_slash() {
        let id = BookingId::new();
        assert_eq!(share_url("https://a.example/", id), format!("https://a.example/?booking={id}"));
    }

    #[tokio::test]
    async fn failed_delivery_is_logged_not_raised() {
        let store = Arc::new(InMemoryBookingStore::new());
        let provider = Arc::new(RecordingEmailProvider::new());
        provider.set_failing(true);
        let dispatcher = NotificationDispatcher::new(
            provider.clone(),
            store.clone(),
            "https://a.example",
            None,
        );
        let (booking, activity) = fixtures();

        let report = dispatcher
            .dispatch(
                Notification {
                    kind: EmailType::Recruitment,
                    booking,
                    activity,
                    recipient: Recipient::address("organizer@example.com"),
                },
                Utc::now(),
            )
            .await;

        assert!(!report.delivered);
        let log = store.email_log().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, DeliveryStatus::Failed);
        assert!(log[0].error.is_some());
        assert!(provider.sent().is_empty());
    }

    #[tokio::test]
    async fn recruitment_carries_the_share_link() {
        let store = Arc::new(InMemoryBookingStore::new());
        let provider = Arc::new(RecordingEmailProvider::new());
        let dispatcher =
            NotificationDispatcher::new(provider.clone(), store.clone(), "https://a.example", None);
        let (booking, activity) = fixtures();
        let expected = dispatcher.share_url(booking.id);

        let report = dispatcher
            .dispatch(
                Notification {
                    kind: EmailType::Recruitment,
                    booking,
                    activity,
                    recipient: Recipient::address("organizer@example.com"),
                },
                Utc::now(),
            )
            .await;

        assert!(report.delivered);
        let sent = provider.sent();
        assert!(sent[0].html.contains(&expected));
        assert_eq!(store.email_log().await[0].provider_message_id.as_deref(), Some("rec-1"));
    }
}
