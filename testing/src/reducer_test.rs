//! Given-When-Then testing for reducers, plus helpers to inspect and drive effects.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use groupbook_core::{effect::Effect, reducer::Reducer};

type StateAssertion<S> = Box<dyn FnOnce(&S)>;

type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Several actions may be given with [`when_actions`](Self::when_actions);
/// state assertions see the state after the last one, effect assertions see
/// the effects returned by the last one.
///
/// # Example
///
/// ```ignore
/// ReducerTest::new(BookingReducer::new())
///     .with_env(env)
///     .given_state(BookingState::new())
///     .when_action(BookingAction::ConfirmBooking { request_id, booking_id })
///     .then_state(|state| assert!(state.outcome(&request_id).is_none()))
///     .then_effects(|effects| assert_eq!(effects.len(), 1))
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to reduce (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add several actions, reduced in order (When)
    #[must_use]
    pub fn when_actions(mut self, actions: impl IntoIterator<Item = A>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Run effects outside a store
///
/// Reducer tests stop at effect descriptions; these helpers run the futures so
/// a test can inspect the actions they would feed back.
pub mod drive {
    use groupbook_core::effect::Effect;
    use std::time::Duration;

    /// What running a batch of effects produced
    #[derive(Debug)]
    pub struct Driven<A> {
        /// Actions yielded by futures, in completion order for parallel
        /// effects and in order for sequential ones
        pub actions: Vec<A>,
        /// Delayed actions that were scheduled, not run
        pub delayed: Vec<(Duration, A)>,
    }

    impl<A> Default for Driven<A> {
        fn default() -> Self {
            Self {
                actions: Vec::new(),
                delayed: Vec::new(),
            }
        }
    }

    /// Await every future in `effects` once, without feeding results back
    pub async fn run_effects<A: Send + 'static>(effects: Vec<Effect<A>>) -> Driven<A> {
        let mut driven = Driven::default();
        let mut stack: Vec<Effect<A>> = effects.into_iter().rev().collect();

        while let Some(effect) = stack.pop() {
            match effect {
                Effect::None => {},
                Effect::Future(fut) => {
                    if let Some(action) = fut.await {
                        driven.actions.push(action);
                    }
                },
                Effect::Delay { duration, action } => driven.delayed.push((duration, *action)),
                Effect::Parallel(inner) => {
                    let mut futures = Vec::new();
                    for effect in inner {
                        match effect {
                            Effect::Future(fut) => futures.push(fut),
                            other => stack.push(other),
                        }
                    }
                    driven
                        .actions
                        .extend(futures::future::join_all(futures).await.into_iter().flatten());
                },
                Effect::Sequential(inner) => stack.extend(inner.into_iter().rev()),
            }
        }

        driven
    }
}

/// Helper assertions for effects
pub mod assertions {
    use groupbook_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(|e| matches!(e, Effect::None)),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of top-level effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that effects contain at least one Future effect
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Find the first delayed action, searching nested effects
    #[must_use]
    pub fn find_delay<A>(effects: &[Effect<A>]) -> Option<(&std::time::Duration, &A)> {
        effects.iter().find_map(|e| match e {
            Effect::Delay { duration, action } => Some((duration, action.as_ref())),
            Effect::Parallel(inner) | Effect::Sequential(inner) => find_delay(inner),
            Effect::None | Effect::Future(_) => None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use groupbook_core::effect::Effect;
    use groupbook_core::reducer::Reducer;
    use std::time::Duration;

    #[derive(Clone, Debug)]
    struct Seats {
        taken: u32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum SeatAction {
        Take(u32),
        Taken(u32),
        Remind,
    }

    struct SeatReducer;

    impl Reducer for SeatReducer {
        type State = Seats;
        type Action = SeatAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Seats,
            action: SeatAction,
            _env: &(),
        ) -> smallvec::SmallVec<[Effect<SeatAction>; 4]> {
            match action {
                SeatAction::Take(n) => {
                    state.taken += n;
                    let taken = state.taken;
                    smallvec::smallvec![Effect::merge(vec![
                        Effect::future(async move { Some(SeatAction::Taken(taken)) }),
                        Effect::Delay {
                            duration: Duration::from_secs(60),
                            action: Box::new(SeatAction::Remind),
                        },
                    ])]
                },
                SeatAction::Taken(_) | SeatAction::Remind => smallvec::smallvec![Effect::None],
            }
        }
    }

    #[test]
    fn state_reflects_every_action() {
        ReducerTest::new(SeatReducer)
            .with_env(())
            .given_state(Seats { taken: 0 })
            .when_actions([SeatAction::Take(2), SeatAction::Take(3)])
            .then_state(|state| assert_eq!(state.taken, 5))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                let (duration, action) = assertions::find_delay(effects).unwrap();
                assert_eq!(*duration, Duration::from_secs(60));
                assert_eq!(action, &SeatAction::Remind);
            })
            .run();
    }

    #[test]
    fn none_effects_count_as_no_effects() {
        assertions::assert_no_effects::<SeatAction>(&[Effect::None]);
        assertions::assert_no_effects::<SeatAction>(&[]);
    }

    #[tokio::test]
    async fn drive_runs_futures_and_collects_delays() {
        let mut state = Seats { taken: 1 };
        let effects = SeatReducer.reduce(&mut state, SeatAction::Take(1), &()).into_vec();

        let driven = drive::run_effects(effects).await;

        assert_eq!(driven.actions, vec![SeatAction::Taken(2)]);
        assert_eq!(driven.delayed.len(), 1);
    }
}
