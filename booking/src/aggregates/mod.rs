//! Reducers for the booking workflow.

pub mod booking;

pub use booking::{
    BookingAction, BookingEnvironment, BookingError, BookingReducer, BookingState, RequestOutcome,
};
