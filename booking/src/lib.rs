//! Group booking service for educational visits.
//!
//! Visitors browse a catalog of activities and form group bookings: one user
//! requests a timeslot for N participants, others join through a share link,
//! and once the activity's minimum participant count is reached a payment
//! window opens and every participant is asked to pay.
//!
//! # Architecture
//!
//! ```text
//! HTTP (axum) ──▶ BookingApp ──BookingAction──▶ Store + BookingReducer
//!                                                   │            ▲
//!                                                effects       events
//!                                                   ▼            │
//!                                  BookingStore · EmailProvider · timers
//! ```
//!
//! # Booking lifecycle
//!
//! ```text
//! pending ──[quorum crossed]──▶ minimum_reached ──[admin confirms]──▶ confirmed
//!                                      │
//!                                      └──[deadline passes unpaid]──▶ abandoned
//! ```
//!
//! The quorum transition is a compare-and-swap in the datastore, so exactly
//! one caller stamps the payment deadline and sends the payment emails.

#![forbid(unsafe_code)]

pub mod aggregates;
pub mod api;
pub mod app;
pub mod bootstrap;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod deadline;
pub mod notifications;
pub mod quorum;
pub mod server;
pub mod session;
pub mod share_link;
pub mod status_view;
pub mod store;
pub mod sweeper;
pub mod types;

pub use aggregates::{BookingAction, BookingEnvironment, BookingError, BookingReducer, BookingState};
pub use app::{BookingApp, BookingDetails, NewBookingRequest};
pub use config::Config;
pub use types::*;
