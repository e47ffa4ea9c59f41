//! Property tests for the full join workflow.
//!
//! Random join sequences against random quorum and capacity settings; after
//! every sequence the stored booking must agree with its participant rows and
//! the email log.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use common::{activity, user, Harness};
use groupbook::store::BookingStore;
use groupbook::{BookingError, BookingStatus, EmailType};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn stored_count_matches_rows_and_quorum(
        min in 1u32..12,
        max in proptest::option::of(4u32..20),
        organizer_seats in 1u32..4,
        joins in proptest::collection::vec(1u32..5, 0..10),
    ) {
        let max = max.map(|m| m.max(min));
        runtime().block_on(async {
            let h = Harness::new(activity(min, max));
            let booking = h.create(&user("org@school.example"), organizer_seats).await.booking;

            let mut expected = organizer_seats;
            let mut previous = organizer_seats;
            for (i, seats) in joins.into_iter().enumerate() {
                match h.app.join(booking.id, user(&format!("p{i}@home.example")), seats).await {
                    Ok(details) => {
                        expected += seats;
                        assert_eq!(details.booking.current_participants, expected);
                        assert!(details.booking.current_participants > previous);
                        previous = details.booking.current_participants;
                    },
                    Err(BookingError::CapacityExceeded { current, .. }) => {
                        assert_eq!(current, expected);
                        assert!(max.is_some_and(|m| expected + seats > m));
                    },
                    Err(e) => panic!("unexpected join failure: {e}"),
                }
            }

            let stored = h.store.get_booking(booking.id).await.unwrap().unwrap();
            let rows = h.store.list_participants(booking.id).await.unwrap();
            let sum: u32 = rows.iter().map(|p| p.participants_count).sum();
            assert_eq!(stored.current_participants, sum);
            assert_eq!(stored.current_participants, expected);
            if let Some(max) = max {
                assert!(stored.current_participants <= max);
            }

            let reached = expected >= min;
            let payment = h.emails_of(booking.id, EmailType::PaymentRequired).await;
            let admin = h.emails_of(booking.id, EmailType::MinimumReached).await;
            if reached {
                assert_eq!(stored.status, BookingStatus::MinimumReached);
                assert!(stored.payment_deadline.is_some());
                assert_eq!(payment.len(), rows.len());
                assert_eq!(admin.len(), 1);
            } else {
                assert_eq!(stored.status, BookingStatus::Pending);
                assert!(stored.payment_deadline.is_none());
                assert!(payment.is_empty());
                assert!(admin.is_empty());
            }
        });
    }
}
