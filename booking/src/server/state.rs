//! Application state for the HTTP server.

use crate::app::BookingApp;
use crate::session::{SessionResolver, SessionUser};
use crate::types::UserId;
use std::collections::HashSet;
use std::sync::Arc;

/// State shared across handlers; cloned per request
#[derive(Clone)]
pub struct AppState {
    /// Booking workflow and read helpers
    pub app: Arc<BookingApp>,
    /// Access-token resolver
    pub sessions: Arc<dyn SessionResolver>,
    admins: Arc<HashSet<UserId>>,
}

impl AppState {
    /// Create the state
    ///
    /// `admins` are the users allowed to confirm bookings.
    #[must_use]
    pub fn new(
        app: Arc<BookingApp>,
        sessions: Arc<dyn SessionResolver>,
        admins: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            app,
            sessions,
            admins: Arc::new(admins.into_iter().collect()),
        }
    }

    /// Whether `user` may run admin actions
    #[must_use]
    pub fn is_admin(&self, user: &SessionUser) -> bool {
        self.admins.contains(&user.user_id)
    }
}
