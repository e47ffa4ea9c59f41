//! Router configuration.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{activities, bookings, share};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the complete router
///
/// - `/health`, `/ready`: probes
/// - `/api/...`: catalog and booking JSON API
/// - `/?booking=<id>` and `/auth/resume`: share-link entry points
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/activities", get(activities::list_activities))
        .route("/activities/:id", get(activities::get_activity))
        .route("/calendar", get(activities::get_calendar))
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/join", post(bookings::join_booking))
        .route("/bookings/:id/confirm", post(bookings::confirm_booking));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/", get(share::open_share_link))
        .route("/auth/resume", get(share::resume_share_link))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
