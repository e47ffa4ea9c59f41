//! Wiring from configuration to a running application.

use crate::aggregates::BookingEnvironment;
use crate::app::BookingApp;
use crate::config::{Config, EmailConfig};
use crate::deadline::PaymentDeadlineSetter;
use crate::notifications::{
    ConsoleEmailProvider, EmailError, EmailProvider, NotificationDispatcher, ResendEmailProvider,
};
use crate::server::AppState;
use crate::session::SessionResolver;
use crate::share_link::ShareLinkHandler;
use crate::store::BookingStore;
use groupbook_core::environment::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Resend when an API key is configured, console output otherwise
///
/// # Errors
///
/// Returns [`EmailError`] if the HTTP client cannot be built.
pub fn email_provider(config: &EmailConfig, timeout: Duration) -> Result<Arc<dyn EmailProvider>, EmailError> {
    match &config.resend_api_key {
        Some(key) => {
            tracing::info!(from = %config.from, "Sending email through Resend");
            Ok(Arc::new(ResendEmailProvider::new(key.clone(), config.from.clone(), timeout)?))
        },
        None => {
            tracing::warn!("RESEND_API_KEY not set, emails will be printed to the console");
            Ok(Arc::new(ConsoleEmailProvider::new()))
        },
    }
}

/// Assemble the workflow, app context and HTTP state
#[must_use]
pub fn assemble(
    config: &Config,
    clock: Arc<dyn Clock>,
    store: Arc<dyn BookingStore>,
    provider: Arc<dyn EmailProvider>,
    sessions: Arc<dyn SessionResolver>,
) -> AppState {
    let dispatcher = Arc::new(NotificationDispatcher::new(
        provider,
        Arc::clone(&store),
        config.server.site_origin.clone(),
        config.email.admin_email.clone(),
    ));
    let deadline = PaymentDeadlineSetter::new(Arc::clone(&store), config.payment_window());
    let share_links = ShareLinkHandler::new(
        Arc::clone(&store),
        config.server.site_origin.clone(),
        config.server.login_url.clone(),
    );

    let environment = BookingEnvironment::new(
        clock,
        store,
        dispatcher,
        deadline,
        config.booking.calendar.clone(),
    );
    let app = Arc::new(BookingApp::new(environment, share_links, config.request_timeout()));

    AppState::new(app, sessions, config.auth.admin_user_ids.iter().copied())
}
