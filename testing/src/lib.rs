//! # Groupbook Testing
//!
//! Testing utilities for the booking reducers.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `ManualClock`)
//! - The Given-When-Then `ReducerTest` builder
//! - Effect assertions and an effect driver that runs futures without a store
//!
//! ## Example
//!
//! ```ignore
//! use groupbook_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(BookingReducer::new())
//!     .with_env(test_environment(test_clock()))
//!     .given_state(BookingState::new())
//!     .when_action(BookingAction::ExpireBooking { booking_id })
//!     .then_effects(|effects| assert_eq!(effects.len(), 1))
//!     .run();
//! ```

use chrono::{DateTime, Duration, Utc};
use groupbook_core::environment::Clock;
use std::sync::{Arc, Mutex, PoisonError};

mod reducer_test;

pub use reducer_test::{ReducerTest, assertions, drive};

/// Mock clocks for deterministic deadlines.
pub mod mocks {
    use super::{Arc, Clock, DateTime, Duration, Mutex, PoisonError, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use groupbook_testing::mocks::FixedClock;
    /// use groupbook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A clock that only moves when told to
    ///
    /// Clones share the same time, so a test can hold one handle while the
    /// environment holds another and still move past a payment deadline.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start the clock at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// 2025-06-01 09:00:00 UTC, a Sunday
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_748_768_400, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests at [`test_time`]
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }
}

/// Install a test-friendly tracing subscriber
///
/// Safe to call from every test; only the first call installs anything.
/// Respects `RUST_LOG`, defaulting to `warn`.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub use mocks::{FixedClock, ManualClock, test_clock, test_time};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike, Weekday};

    #[test]
    fn fixed_clock_never_moves() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_time_is_a_sunday_morning() {
        let t = test_time();
        assert_eq!(t.weekday(), Weekday::Sun);
        assert_eq!((t.year(), t.month(), t.day()), (2025, 6, 1));
        assert_eq!(t.hour(), 9);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(test_time());
        let held_by_env = clock.clone();

        clock.advance(Duration::hours(48));

        assert_eq!(held_by_env.now(), test_time() + Duration::hours(48));
    }
}
