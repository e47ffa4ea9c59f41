//! Booking endpoints.
//!
//! - POST /api/bookings - request a booking (auth)
//! - GET /api/bookings/:id - booking with its status view
//! - POST /api/bookings/:id/join - join through a share link (auth)
//! - POST /api/bookings/:id/confirm - mark as paid (admin)

use super::error::AppError;
use super::extractors::{AdminUser, AuthUser};
use crate::app::{BookingDetails, NewBookingRequest};
use crate::server::state::AppState;
use crate::types::BookingId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

/// Request to join a booking
#[derive(Debug, Deserialize)]
pub struct JoinBookingRequest {
    /// Seats to add
    pub participants: u32,
}

/// Create a booking for the signed-in organizer
pub async fn create_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(request): Json<NewBookingRequest>,
) -> Result<(StatusCode, Json<BookingDetails>), AppError> {
    let details = state.app.request_booking(user, request).await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Booking details
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingDetails>, AppError> {
    Ok(Json(state.app.booking_details(id).await?))
}

/// Join a booking as the signed-in user
pub async fn join_booking(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<BookingId>,
    Json(request): Json<JoinBookingRequest>,
) -> Result<Json<BookingDetails>, AppError> {
    Ok(Json(state.app.join(id, user, request.participants).await?))
}

/// Confirm payment for a booking
pub async fn confirm_booking(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<BookingId>,
) -> Result<Json<BookingDetails>, AppError> {
    tracing::info!(booking_id = %id, admin_id = %admin.user_id, "Confirming booking");
    Ok(Json(state.app.confirm(id).await?))
}
