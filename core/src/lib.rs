//! # Groupbook Core
//!
//! Core traits and types for the group booking workflow.
//!
//! Business logic is written as reducers: pure functions that take the current
//! state and an action, update the state in place, and return descriptions of
//! the side effects that should happen next. The runtime (`groupbook-runtime`)
//! executes those effects and feeds any resulting actions back in.
//!
//! ## Core Concepts
//!
//! - **State**: what the workflow currently knows about bookings
//! - **Action**: every input to a reducer (commands from users, facts reported by effects)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a side-effect description (datastore write, email, timer)
//! - **Environment**: injected dependencies (clock, datastore, email dispatcher)
//!
//! ## Example
//!
//! ```ignore
//! impl Reducer for BookingReducer {
//!     type State = BookingState;
//!     type Action = BookingAction;
//!     type Environment = BookingEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut BookingState,
//!         action: BookingAction,
//!         env: &BookingEnvironment,
//!     ) -> SmallVec<[Effect<BookingAction>; 4]> {
//!         match action {
//!             BookingAction::ExpireBooking { booking_id } => {
//!                 smallvec![Effect::Future(Box::pin(async move { None }))]
//!             }
//!             _ => SmallVec::new(),
//!         }
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the core trait for business logic
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait
    ///
    /// Reducers validate the incoming action, mutate state, and describe the
    /// side effects to run. They never perform I/O themselves.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime. Most actions produce at most
        /// a handful, hence the inline capacity of four.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Boxed future produced by an effect
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are values returned from reducers. Nothing happens until the
    /// runtime executes them.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another, each finishing before the next starts
        Sequential(Vec<Effect<Action>>),

        /// Dispatch an action after a delay (payment window timers)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// If the future yields `Some(action)`, the action is fed back into the reducer.
        Future(EffectFuture<Action>),
    }

    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Wrap an async block whose output is fed back into the reducer
        pub fn future<F>(fut: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Number of leaf effects, flattening `Parallel` and `Sequential`
        #[must_use]
        pub fn leaf_count(&self) -> usize {
            match self {
                Effect::None => 0,
                Effect::Parallel(effects) | Effect::Sequential(effects) => {
                    effects.iter().map(Effect::leaf_count).sum()
                },
                Effect::Delay { .. } | Effect::Future(_) => 1,
            }
        }
    }
}

/// Environment module - dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time so payment deadlines are testable
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use std::time::Duration;

    #[test]
    fn leaf_count_flattens_nested_effects() {
        let effect: Effect<u8> = Effect::merge(vec![
            Effect::None,
            Effect::future(async { Some(1) }),
            Effect::chain(vec![
                Effect::Delay {
                    duration: Duration::from_secs(1),
                    action: Box::new(2),
                },
                Effect::future(async { None }),
            ]),
        ]);

        assert_eq!(effect.leaf_count(), 3);
    }

    #[test]
    fn debug_hides_future_contents() {
        let effect: Effect<u8> = Effect::future(async { None });
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }
}
