//! `PostgreSQL` implementation of [`BookingStore`].
//!
//! Uses runtime-checked `sqlx::query` so the crate builds without a live
//! database. Schema lives in `migrations/`.

use super::{BookingStore, JoinedBooking, MAX_PARTICIPANTS, OpenedWindow, StoreError};
use crate::types::{
    Activity, ActivityId, ActivityStatus, BookingId, BookingParticipant, BookingRequest,
    BookingStatus, EmailLogEntry, Money, ParticipantCount, ParticipantId, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

const ACTIVITY_COLUMNS: &str = "id, slug, title, description, price_per_person, credits_price, \
     min_participants, max_participants, duration_minutes, date_time, location, \
     featured_image, status";

const BOOKING_COLUMNS: &str = "id, activity_id, organizer_id, requested_date_time, \
     participants_requested, current_participants, status, payment_deadline, \
     created_at, updated_at";

/// Booking store backed by `PostgreSQL`
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    /// Wrap an existing pool
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with pool settings
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pool cannot be created.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        min_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Run the bundled migrations
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
    }

    /// The underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_u32(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("{column} is negative: {value}")))
}

fn to_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("{value} does not fit INTEGER")))
}

fn opt_u32(value: Option<i32>, column: &str) -> Result<Option<u32>, StoreError> {
    value.map(|v| to_u32(v, column)).transpose()
}

fn row_to_activity(row: &PgRow) -> Result<Activity, StoreError> {
    let status: String = row.try_get("status")?;
    let price: i64 = row.try_get("price_per_person")?;

    Ok(Activity {
        id: ActivityId::from_uuid(row.try_get("id")?),
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        price_per_person: Money::from_cents(
            u64::try_from(price).map_err(|_| StoreError::Decode(format!("negative price {price}")))?,
        ),
        credits_price: opt_u32(row.try_get("credits_price")?, "credits_price")?,
        min_participants: to_u32(row.try_get("min_participants")?, "min_participants")?,
        max_participants: opt_u32(row.try_get("max_participants")?, "max_participants")?,
        duration_minutes: opt_u32(row.try_get("duration_minutes")?, "duration_minutes")?,
        date_time: row.try_get("date_time")?,
        location: row.try_get("location")?,
        featured_image: row.try_get("featured_image")?,
        status: status
            .parse::<ActivityStatus>()
            .map_err(|e| StoreError::Decode(e.to_string()))?,
    })
}

fn row_to_booking(row: &PgRow) -> Result<BookingRequest, StoreError> {
    let status: String = row.try_get("status")?;

    Ok(BookingRequest {
        id: BookingId::from_uuid(row.try_get("id")?),
        activity_id: ActivityId::from_uuid(row.try_get("activity_id")?),
        organizer_id: UserId::from_uuid(row.try_get("organizer_id")?),
        requested_date_time: row.try_get("requested_date_time")?,
        participants_requested: to_u32(
            row.try_get("participants_requested")?,
            "participants_requested",
        )?,
        current_participants: to_u32(row.try_get("current_participants")?, "current_participants")?,
        status: status
            .parse::<BookingStatus>()
            .map_err(|e| StoreError::Decode(e.to_string()))?,
        payment_deadline: row.try_get("payment_deadline")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_participant(row: &PgRow) -> Result<BookingParticipant, StoreError> {
    Ok(BookingParticipant {
        id: ParticipantId::from_uuid(row.try_get("id")?),
        booking_id: BookingId::from_uuid(row.try_get("booking_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        participants_count: to_u32(row.try_get("participants_count")?, "participants_count")?,
        joined_at: row.try_get("joined_at")?,
    })
}

async fn select_participants<'c, E>(
    executor: E,
    booking_id: BookingId,
) -> Result<Vec<BookingParticipant>, StoreError>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    let rows = sqlx::query(
        r"
        SELECT id, booking_id, user_id, email, name, participants_count, joined_at
        FROM booking_participants
        WHERE booking_id = $1
        ORDER BY joined_at ASC, id ASC
        ",
    )
    .bind(booking_id.as_uuid())
    .fetch_all(executor)
    .await?;

    rows.iter().map(row_to_participant).collect()
}

async fn insert_participant<'c, E>(executor: E, participant: &BookingParticipant) -> Result<(), StoreError>
where
    E: sqlx::Executor<'c, Database = sqlx::Postgres>,
{
    sqlx::query(
        r"
        INSERT INTO booking_participants
            (id, booking_id, user_id, email, name, participants_count, joined_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ",
    )
    .bind(participant.id.as_uuid())
    .bind(participant.booking_id.as_uuid())
    .bind(participant.user_id.as_uuid())
    .bind(&participant.email)
    .bind(participant.name.as_deref())
    .bind(to_i32(participant.participants_count)?)
    .bind(participant.joined_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn list_published_activities(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<Activity>, StoreError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        let rows = sqlx::query(&format!(
            r"
            SELECT {ACTIVITY_COLUMNS}
            FROM activities
            WHERE status = 'published'
              AND ($1::TEXT IS NULL OR title ILIKE $1 OR description ILIKE $1)
            ORDER BY date_time ASC NULLS LAST, title ASC
            "
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_activity).collect()
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<Activity>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_activity).transpose()
    }

    async fn insert_booking(
        &self,
        booking: &BookingRequest,
        organizer: &BookingParticipant,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO booking_requests
                (id, activity_id, organizer_id, requested_date_time, participants_requested,
                 current_participants, status, payment_deadline, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(booking.id.as_uuid())
        .bind(booking.activity_id.as_uuid())
        .bind(booking.organizer_id.as_uuid())
        .bind(booking.requested_date_time)
        .bind(to_i32(booking.participants_requested)?)
        .bind(to_i32(booking.current_participants)?)
        .bind(booking.status.as_str())
        .bind(booking.payment_deadline)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_participant(&mut *tx, organizer).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<BookingRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM booking_requests WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_booking).transpose()
    }

    async fn record_join(
        &self,
        participant: &BookingParticipant,
        max_participants: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<JoinedBooking, StoreError> {
        let max = max_participants.unwrap_or(MAX_PARTICIPANTS).min(MAX_PARTICIPANTS);

        let mut tx = self.pool.begin().await?;

        // A count that does not fit INTEGER can never fit under `max`
        let updated = match i32::try_from(participant.participants_count) {
            Ok(added) => {
                sqlx::query(&format!(
                    r"
                    UPDATE booking_requests
                    SET current_participants = current_participants + $2,
                        updated_at = $4
                    WHERE id = $1
                      AND status IN ('pending', 'minimum_reached')
                      AND current_participants <= $3 - $2
                    RETURNING {BOOKING_COLUMNS}
                    "
                ))
                .bind(participant.booking_id.as_uuid())
                .bind(added)
                .bind(to_i32(max)?)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await?
            },
            Err(_) => None,
        };

        let Some(row) = updated else {
            tx.rollback().await?;
            // Explain why the conditional update matched nothing
            let booking = self
                .get_booking(participant.booking_id)
                .await?
                .ok_or(StoreError::BookingNotFound(participant.booking_id))?;
            if booking.status.is_terminal() {
                return Err(StoreError::BookingClosed {
                    booking_id: booking.id,
                    status: booking.status,
                });
            }
            return Err(StoreError::CapacityExceeded {
                requested: participant.participants_count,
                current: booking.current_participants,
                max,
            });
        };

        let booking = row_to_booking(&row)?;
        insert_participant(&mut *tx, participant).await?;
        tx.commit().await?;

        let current = booking.current_participants;
        Ok(JoinedBooking {
            count: ParticipantCount {
                previous: current.saturating_sub(participant.participants_count),
                current,
            },
            booking,
        })
    }

    async fn list_participants(
        &self,
        booking_id: BookingId,
    ) -> Result<Vec<BookingParticipant>, StoreError> {
        select_participants(&self.pool, booking_id).await
    }

    async fn mark_minimum_reached(
        &self,
        booking_id: BookingId,
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<OpenedWindow>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken here is held until commit, so joins either land
        // before the snapshot below or see `minimum_reached` afterwards.
        let row = sqlx::query(&format!(
            r"
            UPDATE booking_requests
            SET status = 'minimum_reached', payment_deadline = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {BOOKING_COLUMNS}
            "
        ))
        .bind(booking_id.as_uuid())
        .bind(deadline)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let booking = row_to_booking(&row)?;
        let participants = select_participants(&mut *tx, booking_id).await?;
        tx.commit().await?;

        Ok(Some(OpenedWindow {
            booking,
            participants,
        }))
    }

    async fn list_stalled_quorums(&self) -> Result<Vec<BookingId>, StoreError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r"
            SELECT b.id
            FROM booking_requests b
            JOIN activities a ON a.id = b.activity_id
            WHERE b.status = 'pending'
              AND b.current_participants >= a.min_participants
            ORDER BY b.created_at ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| BookingId::from_uuid(id)).collect())
    }

    async fn confirm_booking(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingRequest>, StoreError> {
        let row = sqlx::query(&format!(
            r"
            UPDATE booking_requests
            SET status = 'confirmed', updated_at = $2
            WHERE id = $1 AND status = 'minimum_reached'
            RETURNING {BOOKING_COLUMNS}
            "
        ))
        .bind(booking_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_booking).transpose()
    }

    async fn abandon_if_expired(
        &self,
        booking_id: BookingId,
        now: DateTime<Utc>,
    ) -> Result<Option<BookingRequest>, StoreError> {
        let row = sqlx::query(&format!(
            r"
            UPDATE booking_requests
            SET status = 'abandoned', updated_at = $2
            WHERE id = $1 AND status = 'minimum_reached' AND payment_deadline <= $2
            RETURNING {BOOKING_COLUMNS}
            "
        ))
        .bind(booking_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_booking).transpose()
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<BookingId>, StoreError> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r"
            SELECT id FROM booking_requests
            WHERE status = 'minimum_reached' AND payment_deadline <= $1
            ORDER BY payment_deadline ASC
            ",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| BookingId::from_uuid(id)).collect())
    }

    async fn append_email_log(&self, entry: &EmailLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO email_logs
                (id, booking_id, participant_id, email_type, recipient,
                 provider_message_id, status, error, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(entry.id)
        .bind(entry.booking_id.as_uuid())
        .bind(entry.participant_id.map(|p| *p.as_uuid()))
        .bind(entry.email_type.as_str())
        .bind(&entry.recipient)
        .bind(entry.provider_message_id.as_deref())
        .bind(entry.status.as_str())
        .bind(entry.error.as_deref())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
