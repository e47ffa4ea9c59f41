//! In-memory [`BookingStore`] for tests and local development.
//!
//! A single lock guards all tables, so every conditional update is atomic in
//! the same way the SQL statements are.

use super::{BookingStore, JoinedBooking, MAX_PARTICIPANTS, OpenedWindow, StoreError};
use crate::types::{
    Activity, ActivityId, ActivityStatus, BookingId, BookingParticipant, BookingRequest,
    BookingStatus, EmailLogEntry, ParticipantCount,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    activities: HashMap<ActivityId, Activity>,
    bookings: HashMap<BookingId, BookingRequest>,
    participants: Vec<BookingParticipant>,
    email_log: Vec<EmailLogEntry>,
}

/// Booking store backed by process memory
#[derive(Default)]
pub struct InMemoryBookingStore {
    tables: RwLock<Tables>,
}

impl InMemoryBookingStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with activities
    #[must_use]
    pub fn with_activities(activities: impl IntoIterator<Item = Activity>) -> Self {
        let tables = Tables {
            activities: activities.into_iter().map(|a| (a.id, a)).collect(),
            ..Tables::default()
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Add or replace an activity
    pub async fn upsert_activity(&self, activity: Activity) {
        self.tables
            .write()
            .await
            .activities
            .insert(activity.id, activity);
    }

    /// Every email log row written so far
    pub async fn email_log(&self) -> Vec<EmailLogEntry> {
        self.tables.read().await.email_log.clone()
    }
}

fn matches_search(activity: &Activity, needle: &str) -> bool {
    activity.title.to_lowercase().contains(needle)
        || activity.description.to_lowercase().contains(needle)
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn list_published_activities(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<Activity>, StoreError> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let tables = self.tables.read().await;
        let mut activities: Vec<Activity> = tables
            .activities
            .values()
            .filter(|a| a.status == ActivityStatus::Published)
            .filter(|a| needle.as_deref().is_none_or(|n| matches_search(a, n)))
            .cloned()
            .collect();

        // Undated activities sort after dated ones, like NULLS LAST
        activities.sort_by(|a, b| {
            (a.date_time.is_none(), a.date_time, &a.title)
                .cmp(&(b.date_time.is_none(), b.date_time, &b.title))
        });

        Ok(activities)
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StoreError> {
        Ok(self.tables.read().await.activities.get(&id).cloned())
    }

    async fn insert_booking(
        &self,
        booking: &BookingRequest,
        organizer: &BookingParticipant,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.bookings.contains_key(&booking.id) {
            return Err(StoreError::Database(format!(
                "duplicate key: booking {}",
                booking.id
            )));
        }
        tables.bookings.insert(booking.id, booking.clone());
        tables.participants.push(organizer.clone());
        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<BookingRequest>, StoreError> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn record_join(
        &self,
        participant: &BookingParticipant,
        max_participants: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<JoinedBooking, StoreError> {
        let mut tables = self.tables.write().await;

        let booking = tables
            .bookings
            .get_mut(&participant.booking_id)
            .ok_or(StoreError::BookingNotFound(participant.booking_id))?;

        if !booking.status.accepts_participants() {
            return Err(StoreError::BookingClosed {
                booking_id: booking.id,
                status: booking.status,
            });
        }

        let previous = booking.current_participants;
        let max = max_participants.unwrap_or(MAX_PARTICIPANTS).min(MAX_PARTICIPANTS);
        let current = previous
            .checked_add(participant.participants_count)
            .filter(|current| *current <= max)
            .ok_or(StoreError::CapacityExceeded {
                requested: participant.participants_count,
                current: previous,
                max,
            })?;

        booking.current_participants = current;
        booking.updated_at = now;
        let booking = booking.clone();
        tables.participants.push(participant.clone());

        Ok(JoinedBooking {
            booking,
            count: ParticipantCount { previous, current },
        })
    }

    async fn list_participants(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<BookingParticipant>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .participants
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn mark_minimum_reached(
        &self,
        booking_id: BookingId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<OpenedWindow>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(booking) = tables
            .bookings
            .get_mut(&booking_id)
            .filter(|b| b.status == BookingStatus::Pending)
            .map(|b| {
                b.status = BookingStatus::MinimumReached;
                b.payment_deadline = Some(deadline);
                b.updated_at = now;
                b.clone()
            })
        else {
            return Ok(None);
        };
        let participants = tables
            .participants
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        Ok(Some(OpenedWindow {
            booking,
            participants,
        }))
    }

    async fn list_stalled_quorums(&self) -> Result<Vec<BookingId>, StoreError> {
        let tables = self.tables.read().await;
        let mut stalled: Vec<(DateTime<Utc>, BookingId)> = tables
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::Pending)
            .filter(|b| {
                tables.activities.get(&b.activity_id).is_some_and(|a| {
                    crate::quorum::evaluate(b.current_participants, a.min_participants).is_met()
                })
            })
            .map(|b| (b.created_at, b.id))
            .collect();
        stalled.sort();
        Ok(stalled.into_iter().map(|(_, id)| id).collect())
    }

    async fn confirm_booking(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingRequest>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .bookings
            .get_mut(&booking_id)
            .filter(|b| b.status == BookingStatus::MinimumReached)
            .map(|b| {
                b.status = BookingStatus::Confirmed;
                b.updated_at = now;
                b.clone()
            }))
    }

    async fn abandon_if_expired(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingRequest>, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .bookings
            .get_mut(&booking_id)
            .filter(|b| {
                b.status == BookingStatus::MinimumReached
                    && b.payment_deadline.is_some_and(|d| d <= now)
            })
            .map(|b| {
                b.status = BookingStatus::Abandoned;
                b.updated_at = now;
                b.clone()
            }))
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<BookingId>, StoreError> {
        let tables = self.tables.read().await;
        let mut expired: Vec<(DateTime<Utc>, BookingId)> = tables
            .bookings
            .values()
            .filter(|b| b.status == BookingStatus::MinimumReached)
            .filter_map(|b| b.payment_deadline.filter(|d| *d <= now).map(|d| (d, b.id)))
            .collect();
        expired.sort();
        Ok(expired.into_iter().map(|(_, id)| id).collect())
    }

    async fn append_email_log(&self, entry: &EmailLogEntry) -> Result<(), StoreError> {
        self.tables.write().await.email_log.push(entry.clone());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
