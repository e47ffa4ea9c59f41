//! HTTP API: handlers, extractors and error mapping.

pub mod activities;
pub mod bookings;
pub mod error;
pub mod extractors;
pub mod share;

pub use error::AppError;
