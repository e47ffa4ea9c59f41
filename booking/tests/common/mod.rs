//! Shared fixtures for the booking integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use chrono::{DateTime, Duration, Utc};
use groupbook::bootstrap;
use groupbook::calendar::BookingCalendar;
use groupbook::config::{AuthConfig, BookingConfig, Config, DatabaseConfig, EmailConfig, ServerConfig};
use groupbook::notifications::RecordingEmailProvider;
use groupbook::server::AppState;
use groupbook::session::{SessionUser, StaticSessionResolver};
use groupbook::store::InMemoryBookingStore;
use groupbook::{
    Activity, ActivityId, ActivityStatus, BookingApp, BookingDetails, BookingId, EmailLogEntry,
    EmailType, Money, NewBookingRequest, UserId,
};
use groupbook_testing::mocks::{test_time, ManualClock};
use std::sync::Arc;

pub const SITE_ORIGIN: &str = "https://visits.example";
pub const LOGIN_URL: &str = "https://visits.example/login";
pub const ADMIN_EMAIL: &str = "team@visits.example";

/// Published activity with the given quorum and capacity
pub fn activity(min: u32, max: Option<u32>) -> Activity {
    Activity {
        id: ActivityId::new(),
        slug: "beekeeping".to_string(),
        title: "Beekeeping morning".to_string(),
        description: "Hives, smokers and a honey tasting".to_string(),
        price_per_person: Money::from_cents(1500),
        credits_price: Some(3),
        min_participants: min,
        max_participants: max,
        duration_minutes: Some(150),
        date_time: None,
        location: Some("Community garden".to_string()),
        featured_image: None,
        status: ActivityStatus::Published,
    }
}

pub fn user(email: &str) -> SessionUser {
    SessionUser {
        user_id: UserId::new(),
        email: email.to_string(),
        name: None,
    }
}

/// Tuesday 2025-06-10 10:00 UTC, inside the default booking window
pub fn bookable_date() -> DateTime<Utc> {
    test_time() + Duration::days(9) + Duration::hours(1)
}

pub fn test_config() -> Config {
    Config {
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            connect_timeout: 1,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            site_origin: SITE_ORIGIN.to_string(),
            login_url: LOGIN_URL.to_string(),
            request_timeout: 5,
            shutdown_timeout: 5,
        },
        auth: AuthConfig {
            base_url: "http://auth.invalid".to_string(),
            anon_key: String::new(),
            admin_user_ids: Vec::new(),
        },
        email: EmailConfig {
            resend_api_key: None,
            from: "bookings@visits.example".to_string(),
            admin_email: Some(ADMIN_EMAIL.to_string()),
        },
        booking: BookingConfig {
            payment_window_hours: 48,
            sweep_interval: 60,
            calendar: BookingCalendar::default(),
        },
    }
}

/// An in-memory application wired the same way the server wires it
pub struct Harness {
    pub state: AppState,
    pub app: Arc<BookingApp>,
    pub store: Arc<InMemoryBookingStore>,
    pub emails: Arc<RecordingEmailProvider>,
    pub clock: ManualClock,
    pub activity: Activity,
}

impl Harness {
    pub fn new(activity: Activity) -> Self {
        Self::build(activity, test_config(), StaticSessionResolver::new())
    }

    pub fn build(activity: Activity, config: Config, sessions: StaticSessionResolver) -> Self {
        groupbook_testing::init_test_tracing();

        let store = Arc::new(InMemoryBookingStore::with_activities([activity.clone()]));
        let emails = Arc::new(RecordingEmailProvider::new());
        let clock = ManualClock::new(test_time());
        let state = bootstrap::assemble(
            &config,
            Arc::new(clock.clone()),
            store.clone(),
            emails.clone(),
            Arc::new(sessions),
        );

        Self {
            app: Arc::clone(&state.app),
            state,
            store,
            emails,
            clock,
            activity,
        }
    }

    pub async fn create(&self, organizer: &SessionUser, participants: u32) -> BookingDetails {
        self.app
            .request_booking(
                organizer.clone(),
                NewBookingRequest {
                    activity_id: self.activity.id,
                    requested_date_time: Some(bookable_date()),
                    participants,
                },
            )
            .await
            .unwrap()
    }

    pub async fn emails_of(&self, booking_id: BookingId, kind: EmailType) -> Vec<EmailLogEntry> {
        self.store
            .email_log()
            .await
            .into_iter()
            .filter(|e| e.booking_id == booking_id && e.email_type == kind)
            .collect()
    }
}
