//! Catalog endpoints.
//!
//! - GET /api/activities?search= - published activity cards
//! - GET /api/activities/:id - one card
//! - GET /api/calendar - bookable window and time slots

use super::error::AppError;
use crate::calendar::DateRange;
use crate::catalog::ActivityCard;
use crate::server::state::AppState;
use crate::types::ActivityId;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Query parameters for the catalog
#[derive(Debug, Default, Deserialize)]
pub struct ListActivitiesQuery {
    /// Case-insensitive match on title or description
    pub search: Option<String>,
}

/// Bookable window for the date picker
#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    /// First selectable date
    pub earliest_date: NaiveDate,
    /// Last selectable date
    pub latest_date: NaiveDate,
    /// Closed weekdays
    pub blocked_weekdays: Vec<Weekday>,
    /// Closed periods
    pub blocked_ranges: Vec<DateRange>,
    /// Morning starts, `HH:MM`
    pub morning_slots: Vec<String>,
    /// Afternoon starts, `HH:MM`
    pub afternoon_slots: Vec<String>,
}

/// List published activities
pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ListActivitiesQuery>,
) -> Result<Json<Vec<ActivityCard>>, AppError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let cards = state.app.catalog().list(search).await?;
    Ok(Json(cards))
}

/// One published activity
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
) -> Result<Json<ActivityCard>, AppError> {
    state
        .app
        .catalog()
        .card(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("activity {id} not found")))
}

/// Booking calendar for the date picker
#[allow(clippy::unused_async)]
pub async fn get_calendar(State(state): State<AppState>) -> Json<CalendarResponse> {
    let calendar = state.app.calendar();
    let now = state.app.workflow().environment().clock.now();
    let slots = |times: &[NaiveTime]| -> Vec<String> {
        times.iter().map(|t| t.format("%H:%M").to_string()).collect()
    };

    Json(CalendarResponse {
        earliest_date: calendar.earliest_date(now),
        latest_date: calendar.latest_date(now),
        blocked_weekdays: calendar.blocked_weekdays.clone(),
        blocked_ranges: calendar.blocked_ranges.clone(),
        morning_slots: slots(&calendar.morning_slots),
        afternoon_slots: slots(&calendar.afternoon_slots),
    })
}
