//! Quorum evaluation.
//!
//! A booking goes ahead once its participant count reaches the activity's
//! minimum. The comparison is rerun after creation and after every join. Any
//! pending booking whose count meets the minimum asks for the transition; the
//! conditional store update lets exactly one of those requests win.

use serde::Serialize;

/// Whether a count meets an activity's minimum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuorumStatus {
    /// `current >= min`
    Met,
    /// `current < min`
    Unmet {
        /// Participants still needed
        missing: u32,
    },
}

impl QuorumStatus {
    /// True for [`QuorumStatus::Met`]
    #[must_use]
    pub const fn is_met(self) -> bool {
        matches!(self, Self::Met)
    }
}

/// Compare a participant count with the activity minimum
#[must_use]
pub const fn evaluate(current: u32, min: u32) -> QuorumStatus {
    if current >= min {
        QuorumStatus::Met
    } else {
        QuorumStatus::Unmet {
            missing: min - current,
        }
    }
}

/// True only for the change that moves the count from below to at-or-above `min`
#[must_use]
pub const fn crossed(previous: u32, current: u32, min: u32) -> bool {
    previous < min && min <= current
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundary_is_inclusive() {
        assert_eq!(evaluate(5, 5), QuorumStatus::Met);
        assert_eq!(evaluate(4, 5), QuorumStatus::Unmet { missing: 1 });
        assert_eq!(evaluate(0, 5), QuorumStatus::Unmet { missing: 5 });
    }

    #[test]
    fn crossing_needs_both_sides() {
        assert!(crossed(4, 5, 5));
        assert!(crossed(2, 9, 5));
        assert!(!crossed(5, 6, 5));
        assert!(!crossed(3, 4, 5));
    }

    proptest! {
        #[test]
        fn a_sequence_of_joins_crosses_at_most_once(
            start in 1u32..10,
            joins in proptest::collection::vec(1u32..6, 0..20),
            min in 1u32..30,
        ) {
            let mut count = start;
            let mut crossings = 0;
            for n in joins {
                let next = count + n;
                if crossed(count, next, min) {
                    crossings += 1;
                }
                count = next;
            }
            prop_assert!(crossings <= 1);
            if start < min && count >= min {
                prop_assert_eq!(crossings, 1);
            }
        }

        #[test]
        fn crossing_implies_met(previous in 0u32..100, added in 0u32..100, min in 1u32..100) {
            let current = previous + added;
            if crossed(previous, current, min) {
                prop_assert!(evaluate(current, min).is_met());
                prop_assert!(!evaluate(previous, min).is_met());
            }
        }
    }
}
