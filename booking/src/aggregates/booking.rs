//! Booking workflow reducer.
//!
//! Drives a group booking through its lifecycle:
//! 1. Request: validate, persist the booking and the organizer's seats
//! 2. Quorum unmet: email the organizer a share link
//! 3. Join: atomic increment, re-evaluate the quorum
//! 4. Quorum met while pending: open the payment window (status CAS), email
//!    everyone in the snapshot taken with the transition, schedule expiry
//! 5. Confirm (admin) or expire (deadline passed unpaid)
//!
//! The reducer never touches the datastore or the email API directly; it
//! returns effects that do, and the results come back as events.

use crate::calendar::{BookingCalendar, CalendarError};
use crate::deadline::{DeadlineOutcome, PaymentDeadlineSetter};
use crate::notifications::{DeliveryReport, Notification, NotificationDispatcher, Recipient};
use crate::quorum;
use crate::session::SessionUser;
use crate::store::{BookingStore, MAX_PARTICIPANTS, StoreError};
use crate::types::{
    Activity, ActivityId, ActivityStatus, BookingId, BookingParticipant, BookingRequest,
    BookingStatus, EmailType, ParticipantCount, ParticipantId, RequestId,
};
use chrono::{DateTime, Utc};
use groupbook_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// Outcomes kept for callers waiting on a request
const MAX_TRACKED_OUTCOMES: usize = 1024;

// ============================================================================
// Errors
// ============================================================================

/// Why a booking command was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// No such activity
    #[error("activity {0} not found")]
    ActivityNotFound(ActivityId),

    /// Draft or archived activity
    #[error("activity {0} is not open for booking")]
    ActivityUnavailable(ActivityId),

    /// No such booking
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    /// Request without a date-time
    #[error("a date and time must be chosen")]
    MissingDateTime,

    /// Zero participants, or more than a booking can hold
    #[error("participant count must be at least 1 and at most 2147483647")]
    InvalidParticipantCount,

    /// Over the activity's capacity
    #[error("cannot add {requested} participants: {current} of {max} places taken")]
    CapacityExceeded {
        /// Seats asked for
        requested: u32,
        /// Seats already taken
        current: u32,
        /// Activity capacity
        max: u32,
    },

    /// Calendar rule broken
    #[error(transparent)]
    DateNotBookable(#[from] CalendarError),

    /// Confirmed or abandoned booking
    #[error("booking {booking_id} is {status} and no longer accepts participants")]
    BookingClosed {
        /// Booking
        booking_id: BookingId,
        /// Its terminal status
        status: BookingStatus,
    },

    /// Status change not allowed from the current status
    #[error("booking {booking_id} cannot change state while {status}")]
    InvalidTransition {
        /// Booking
        booking_id: BookingId,
        /// Current status
        status: BookingStatus,
    },

    /// Datastore failure
    #[error("storage error: {0}")]
    Storage(String),

    /// No outcome before the caller gave up
    #[error("timed out waiting for the booking workflow")]
    Timeout,

    /// The workflow runtime is not accepting work
    #[error("booking service unavailable: {0}")]
    Unavailable(String),
}

impl From<groupbook_runtime::StoreError> for BookingError {
    fn from(err: groupbook_runtime::StoreError) -> Self {
        match err {
            groupbook_runtime::StoreError::Timeout => Self::Timeout,
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BookingNotFound(id) => Self::BookingNotFound(id),
            StoreError::BookingClosed { booking_id, status } => Self::BookingClosed { booking_id, status },
            StoreError::CapacityExceeded {
                requested,
                current,
                max,
            } => Self::CapacityExceeded {
                requested,
                current,
                max,
            },
            e @ (StoreError::Database(_) | StoreError::Decode(_)) => Self::Storage(e.to_string()),
        }
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the booking workflow
#[derive(Clone, Debug, PartialEq)]
pub enum BookingAction {
    // Commands
    /// Create a booking for a timeslot
    RequestBooking {
        /// Correlates the outcome with the caller
        request_id: RequestId,
        /// ID the new booking will get
        booking_id: BookingId,
        /// Activity to book
        activity_id: ActivityId,
        /// Signed-in organizer
        organizer: SessionUser,
        /// Chosen start
        requested_date_time: Option<DateTime<Utc>>,
        /// Seats the organizer books
        participants: u32,
    },

    /// Add seats to an existing booking
    JoinBooking {
        /// Correlates the outcome with the caller
        request_id: RequestId,
        /// Booking to join
        booking_id: BookingId,
        /// Signed-in joiner
        user: SessionUser,
        /// Seats to add
        participants: u32,
    },

    /// Admin marks the booking as paid
    ConfirmBooking {
        /// Correlates the outcome with the caller
        request_id: RequestId,
        /// Booking to confirm
        booking_id: BookingId,
    },

    /// Open the payment window if a pending booking already meets its minimum
    EvaluateQuorum {
        /// Booking to check
        booking_id: BookingId,
    },

    /// Abandon the booking if its payment window has closed
    ExpireBooking {
        /// Booking to check
        booking_id: BookingId,
    },

    // Events
    /// Booking and organizer row persisted
    BookingCreated {
        /// Originating request
        request_id: RequestId,
        /// New booking
        booking: BookingRequest,
        /// Its activity
        activity: Activity,
        /// Organizer's participant row
        organizer: BookingParticipant,
    },

    /// Join persisted
    ParticipantJoined {
        /// Originating request
        request_id: RequestId,
        /// Booking after the increment
        booking: BookingRequest,
        /// Its activity
        activity: Activity,
        /// New participant row
        participant: BookingParticipant,
        /// Counter before and after
        count: ParticipantCount,
    },

    /// This workflow won the `pending → minimum_reached` transition
    QuorumReached {
        /// Booking with its deadline
        booking: BookingRequest,
        /// Its activity
        activity: Activity,
        /// Everyone to ask for payment
        participants: Vec<BookingParticipant>,
    },

    /// Another caller already opened the payment window
    QuorumAlreadyReached {
        /// Booking
        booking_id: BookingId,
    },

    /// Booking paid
    BookingConfirmed {
        /// Originating request
        request_id: RequestId,
        /// Confirmed booking
        booking: BookingRequest,
    },

    /// Payment window closed unpaid
    BookingAbandoned {
        /// Abandoned booking
        booking: BookingRequest,
    },

    /// An email attempt finished
    NotificationSent {
        /// Delivery outcome
        report: DeliveryReport,
    },

    /// A command failed after validation
    BookingRejected {
        /// Originating request
        request_id: RequestId,
        /// Reason
        error: BookingError,
    },

    /// A command failed validation
    ValidationFailed {
        /// Originating request
        request_id: RequestId,
        /// Reason
        error: BookingError,
    },

    /// A follow-up step failed with no caller waiting on it
    OperationFailed {
        /// Booking concerned
        booking_id: BookingId,
        /// Reason
        error: BookingError,
    },
}

// ============================================================================
// State
// ============================================================================

/// Final answer to one command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Command applied to this booking
    Accepted {
        /// Booking affected
        booking_id: BookingId,
    },
    /// Command refused
    Rejected(BookingError),
}

/// Workflow state
///
/// The datastore is the source of truth. State caches live bookings and
/// remembers recent request outcomes so callers can read their result.
#[derive(Clone, Debug, Default)]
pub struct BookingState {
    bookings: HashMap<BookingId, BookingRequest>,
    outcomes: HashMap<RequestId, RequestOutcome>,
    outcome_order: VecDeque<RequestId>,
    /// Most recent failure
    pub last_error: Option<BookingError>,
}

impl BookingState {
    /// Empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached live booking
    #[must_use]
    pub fn booking(&self, id: &BookingId) -> Option<&BookingRequest> {
        self.bookings.get(id)
    }

    /// Number of cached live bookings
    #[must_use]
    pub fn live_bookings(&self) -> usize {
        self.bookings.len()
    }

    /// Outcome of a request, once known
    #[must_use]
    pub fn outcome(&self, request_id: &RequestId) -> Option<&RequestOutcome> {
        self.outcomes.get(request_id)
    }

    fn record_outcome(&mut self, request_id: RequestId, outcome: RequestOutcome) {
        if self.outcomes.insert(request_id, outcome).is_none() {
            self.outcome_order.push_back(request_id);
        }
        while self.outcome_order.len() > MAX_TRACKED_OUTCOMES {
            if let Some(oldest) = self.outcome_order.pop_front() {
                self.outcomes.remove(&oldest);
            }
        }
    }

    fn cache(&mut self, booking: &BookingRequest) {
        if booking.status.is_terminal() {
            self.bookings.remove(&booking.id);
        } else {
            self.bookings.insert(booking.id, booking.clone());
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the booking workflow
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Clock for timestamps and deadlines
    pub clock: Arc<dyn Clock>,
    /// Datastore
    pub store: Arc<dyn BookingStore>,
    /// Email sender
    pub dispatcher: Arc<NotificationDispatcher>,
    /// Payment window CAS
    pub deadline: PaymentDeadlineSetter,
    /// Bookable date rules
    pub calendar: BookingCalendar,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn BookingStore>,
        dispatcher: Arc<NotificationDispatcher>,
        deadline: PaymentDeadlineSetter,
        calendar: BookingCalendar,
    ) -> Self {
        Self {
            clock,
            store,
            dispatcher,
            deadline,
            calendar,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the booking workflow
#[derive(Clone, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_request(
        env: &BookingEnvironment,
        requested_date_time: Option<DateTime<Utc>>,
        participants: u32,
    ) -> Result<DateTime<Utc>, BookingError> {
        if participants == 0 || participants > MAX_PARTICIPANTS {
            return Err(BookingError::InvalidParticipantCount);
        }
        let requested = requested_date_time.ok_or(BookingError::MissingDateTime)?;
        env.calendar.validate(requested, env.clock.now())?;
        Ok(requested)
    }

    /// Applies an event to state
    fn apply_event(state: &mut BookingState, action: &BookingAction) {
        match action {
            BookingAction::BookingCreated {
                request_id,
                booking,
                ..
            }
            | BookingAction::ParticipantJoined {
                request_id,
                booking,
                ..
            }
            | BookingAction::BookingConfirmed {
                request_id,
                booking,
            } => {
                state.cache(booking);
                state.record_outcome(
                    *request_id,
                    RequestOutcome::Accepted {
                        booking_id: booking.id,
                    },
                );
            },
            BookingAction::QuorumReached { booking, .. }
            | BookingAction::BookingAbandoned { booking } => state.cache(booking),
            BookingAction::BookingRejected { request_id, error }
            | BookingAction::ValidationFailed { request_id, error } => {
                state.record_outcome(*request_id, RequestOutcome::Rejected(error.clone()));
                state.last_error = Some(error.clone());
            },
            BookingAction::OperationFailed { error, .. } => {
                state.last_error = Some(error.clone());
            },
            // Commands and informational events don't change state
            BookingAction::RequestBooking { .. }
            | BookingAction::JoinBooking { .. }
            | BookingAction::ConfirmBooking { .. }
            | BookingAction::EvaluateQuorum { .. }
            | BookingAction::ExpireBooking { .. }
            | BookingAction::QuorumAlreadyReached { .. }
            | BookingAction::NotificationSent { .. } => {},
        }
    }

    /// Effect: send one email and report back
    fn notify(
        env: &BookingEnvironment,
        kind: EmailType,
        booking: &BookingRequest,
        activity: &Activity,
        recipient: Recipient,
    ) -> Effect<BookingAction> {
        let dispatcher = Arc::clone(&env.dispatcher);
        let now = env.clock.now();
        let notification = Notification {
            kind,
            booking: booking.clone(),
            activity: activity.clone(),
            recipient,
        };

        Effect::future(async move {
            let report = dispatcher.dispatch(notification, now).await;
            Some(BookingAction::NotificationSent { report })
        })
    }

    /// Effect: try to open the payment window
    fn open_payment_window(
        env: &BookingEnvironment,
        booking_id: BookingId,
        activity: Activity,
    ) -> Effect<BookingAction> {
        let setter = env.deadline.clone();
        let now = env.clock.now();

        Effect::future(async move { Some(open_window(&setter, booking_id, activity, now).await) })
    }
}

async fn open_window(
    setter: &PaymentDeadlineSetter,
    booking_id: BookingId,
    activity: Activity,
    now: DateTime<Utc>,
) -> BookingAction {
    match setter.set(booking_id, now).await {
        Ok(DeadlineOutcome::Set {
            booking,
            participants,
        }) => BookingAction::QuorumReached {
            booking,
            activity,
            participants,
        },
        Ok(DeadlineOutcome::AlreadyTransitioned) => BookingAction::QuorumAlreadyReached { booking_id },
        Err(e) => BookingAction::OperationFailed {
            booking_id,
            error: e.into(),
        },
    }
}

/// Reload a booking and open its window if it is pending with the minimum met
async fn evaluate_quorum(
    store: &dyn BookingStore,
    setter: &PaymentDeadlineSetter,
    booking_id: BookingId,
    now: DateTime<Utc>,
) -> Result<Option<BookingAction>, BookingError> {
    let booking = store
        .get_booking(booking_id)
        .await?
        .ok_or(BookingError::BookingNotFound(booking_id))?;
    if booking.status != BookingStatus::Pending {
        return Ok(None);
    }

    let activity = store
        .get_activity(booking.activity_id)
        .await?
        .ok_or(BookingError::ActivityNotFound(booking.activity_id))?;
    if !quorum::evaluate(booking.current_participants, activity.min_participants).is_met() {
        return Ok(None);
    }

    tracing::info!(%booking_id, "Pending booking meets its minimum, opening payment window");
    Ok(Some(open_window(setter, booking_id, activity, now).await))
}

/// Fields for a new booking, validated synchronously
struct NewBooking {
    booking_id: BookingId,
    activity_id: ActivityId,
    organizer: SessionUser,
    requested_date_time: DateTime<Utc>,
    participants: u32,
}

async fn create_booking(
    store: &dyn BookingStore,
    new: NewBooking,
    now: DateTime<Utc>,
) -> Result<(BookingRequest, Activity, BookingParticipant), BookingError> {
    let activity = store
        .get_activity(new.activity_id)
        .await?
        .ok_or(BookingError::ActivityNotFound(new.activity_id))?;

    if activity.status != ActivityStatus::Published {
        return Err(BookingError::ActivityUnavailable(activity.id));
    }
    if let Some(max) = activity.max_participants {
        if new.participants > max {
            return Err(BookingError::CapacityExceeded {
                requested: new.participants,
                current: 0,
                max,
            });
        }
    }

    let booking = BookingRequest::new(
        new.booking_id,
        activity.id,
        new.organizer.user_id,
        new.requested_date_time,
        new.participants,
        now,
    );
    let organizer = BookingParticipant {
        id: ParticipantId::new(),
        booking_id: booking.id,
        user_id: new.organizer.user_id,
        email: new.organizer.email,
        name: new.organizer.name,
        participants_count: new.participants,
        joined_at: now,
    };

    store.insert_booking(&booking, &organizer).await?;
    tracing::info!(
        booking_id = %booking.id,
        activity_id = %activity.id,
        participants = booking.current_participants,
        "Booking created"
    );
    metrics::counter!("bookings.created").increment(1);

    Ok((booking, activity, organizer))
}

async fn join_booking(
    store: &dyn BookingStore,
    booking_id: BookingId,
    user: SessionUser,
    participants: u32,
    now: DateTime<Utc>,
) -> Result<(BookingRequest, Activity, BookingParticipant, ParticipantCount), BookingError> {
    let booking = store
        .get_booking(booking_id)
        .await?
        .ok_or(BookingError::BookingNotFound(booking_id))?;

    if !booking.status.accepts_participants() {
        return Err(BookingError::BookingClosed {
            booking_id,
            status: booking.status,
        });
    }

    let activity = store
        .get_activity(booking.activity_id)
        .await?
        .ok_or(BookingError::ActivityNotFound(booking.activity_id))?;

    let participant = BookingParticipant {
        id: ParticipantId::new(),
        booking_id,
        user_id: user.user_id,
        email: user.email,
        name: user.name,
        participants_count: participants,
        joined_at: now,
    };

    let joined = store
        .record_join(&participant, activity.max_participants, now)
        .await?;
    tracing::info!(
        %booking_id,
        previous = joined.count.previous,
        current = joined.count.current,
        "Participant joined"
    );
    metrics::counter!("bookings.joins").increment(1);

    Ok((joined.booking, activity, participant, joined.count))
}

async fn confirm_booking(
    store: &dyn BookingStore,
    booking_id: BookingId,
    now: DateTime<Utc>,
) -> Result<BookingRequest, BookingError> {
    if let Some(booking) = store.confirm_booking(booking_id, now).await? {
        return Ok(booking);
    }

    match store.get_booking(booking_id).await? {
        None => Err(BookingError::BookingNotFound(booking_id)),
        Some(booking) => Err(BookingError::InvalidTransition {
            booking_id,
            status: booking.status,
        }),
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Action = BookingAction;
    type Environment = BookingEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Request ==========
            BookingAction::RequestBooking {
                request_id,
                booking_id,
                activity_id,
                organizer,
                requested_date_time,
                participants,
            } => {
                let requested_date_time =
                    match Self::validate_request(env, requested_date_time, participants) {
                        Ok(at) => at,
                        Err(error) => {
                            tracing::debug!(%request_id, %error, "Booking request rejected");
                            Self::apply_event(
                                state,
                                &BookingAction::ValidationFailed { request_id, error },
                            );
                            return SmallVec::new();
                        },
                    };

                let store = Arc::clone(&env.store);
                let now = env.clock.now();
                let new = NewBooking {
                    booking_id,
                    activity_id,
                    organizer,
                    requested_date_time,
                    participants,
                };

                smallvec![Effect::future(async move {
                    Some(match create_booking(store.as_ref(), new, now).await {
                        Ok((booking, activity, organizer)) => BookingAction::BookingCreated {
                            request_id,
                            booking,
                            activity,
                            organizer,
                        },
                        Err(error) => BookingAction::BookingRejected { request_id, error },
                    })
                })]
            },

            BookingAction::BookingCreated {
                ref booking,
                ref activity,
                ref organizer,
                ..
            } => {
                Self::apply_event(state, &action);

                let met = quorum::evaluate(booking.current_participants, activity.min_participants).is_met();
                if booking.status == BookingStatus::Pending && met {
                    smallvec![Self::open_payment_window(env, booking.id, activity.clone())]
                } else {
                    smallvec![Self::notify(
                        env,
                        EmailType::Recruitment,
                        booking,
                        activity,
                        Recipient::participant(organizer),
                    )]
                }
            },

            // ========== Join ==========
            BookingAction::JoinBooking {
                request_id,
                booking_id,
                user,
                participants,
            } => {
                if participants == 0 || participants > MAX_PARTICIPANTS {
                    Self::apply_event(
                        state,
                        &BookingAction::ValidationFailed {
                            request_id,
                            error: BookingError::InvalidParticipantCount,
                        },
                    );
                    return SmallVec::new();
                }

                let store = Arc::clone(&env.store);
                let now = env.clock.now();

                smallvec![Effect::future(async move {
                    Some(
                        match join_booking(store.as_ref(), booking_id, user, participants, now).await {
                            Ok((booking, activity, participant, count)) => {
                                BookingAction::ParticipantJoined {
                                    request_id,
                                    booking,
                                    activity,
                                    participant,
                                    count,
                                }
                            },
                            Err(error) => BookingAction::BookingRejected { request_id, error },
                        },
                    )
                })]
            },

            BookingAction::ParticipantJoined {
                ref booking,
                ref activity,
                ref participant,
                count,
                ..
            } => {
                Self::apply_event(state, &action);

                let met = quorum::evaluate(count.current, activity.min_participants).is_met();
                if booking.status == BookingStatus::Pending && met {
                    if !quorum::crossed(count.previous, count.current, activity.min_participants) {
                        tracing::info!(
                            booking_id = %booking.id,
                            "Quorum already met but window still closed, retrying"
                        );
                    }
                    smallvec![Self::open_payment_window(env, booking.id, activity.clone())]
                } else if booking.status == BookingStatus::MinimumReached {
                    // Late joiner: the window is already open
                    smallvec![Self::notify(
                        env,
                        EmailType::PaymentRequired,
                        booking,
                        activity,
                        Recipient::participant(participant),
                    )]
                } else {
                    SmallVec::new()
                }
            },

            // ========== Quorum ==========
            BookingAction::QuorumReached {
                ref booking,
                ref activity,
                ref participants,
            } => {
                Self::apply_event(state, &action);

                let mut emails: Vec<Effect<BookingAction>> = participants
                    .iter()
                    .map(|p| {
                        Self::notify(
                            env,
                            EmailType::PaymentRequired,
                            booking,
                            activity,
                            Recipient::participant(p),
                        )
                    })
                    .collect();
                if let Some(admin) = env.dispatcher.admin_email() {
                    emails.push(Self::notify(
                        env,
                        EmailType::MinimumReached,
                        booking,
                        activity,
                        Recipient::address(admin),
                    ));
                }

                let Some(deadline) = booking.payment_deadline else {
                    return smallvec![Effect::merge(emails)];
                };
                let until_deadline = (deadline - env.clock.now()).to_std().unwrap_or_default();

                smallvec![
                    Effect::merge(emails),
                    Effect::Delay {
                        duration: until_deadline,
                        action: Box::new(BookingAction::ExpireBooking {
                            booking_id: booking.id,
                        }),
                    }
                ]
            },

            BookingAction::QuorumAlreadyReached { booking_id } => {
                tracing::debug!(%booking_id, "Payment window already open, skipping emails");
                SmallVec::new()
            },

            BookingAction::EvaluateQuorum { booking_id } => {
                let store = Arc::clone(&env.store);
                let setter = env.deadline.clone();
                let now = env.clock.now();

                smallvec![Effect::future(async move {
                    match evaluate_quorum(store.as_ref(), &setter, booking_id, now).await {
                        Ok(action) => action,
                        Err(error) => Some(BookingAction::OperationFailed { booking_id, error }),
                    }
                })]
            },

            // ========== Confirm ==========
            BookingAction::ConfirmBooking {
                request_id,
                booking_id,
            } => {
                let store = Arc::clone(&env.store);
                let now = env.clock.now();

                smallvec![Effect::future(async move {
                    Some(match confirm_booking(store.as_ref(), booking_id, now).await {
                        Ok(booking) => BookingAction::BookingConfirmed {
                            request_id,
                            booking,
                        },
                        Err(error) => BookingAction::BookingRejected { request_id, error },
                    })
                })]
            },

            BookingAction::BookingConfirmed { ref booking, .. } => {
                Self::apply_event(state, &action);
                tracing::info!(booking_id = %booking.id, "Booking confirmed");
                metrics::counter!("bookings.confirmed").increment(1);
                SmallVec::new()
            },

            // ========== Expire ==========
            BookingAction::ExpireBooking { booking_id } => {
                let store = Arc::clone(&env.store);
                let now = env.clock.now();

                smallvec![Effect::future(async move {
                    match store.abandon_if_expired(booking_id, now).await {
                        Ok(Some(booking)) => Some(BookingAction::BookingAbandoned { booking }),
                        Ok(None) => {
                            tracing::debug!(%booking_id, "Nothing to expire");
                            None
                        },
                        Err(e) => Some(BookingAction::OperationFailed {
                            booking_id,
                            error: e.into(),
                        }),
                    }
                })]
            },

            BookingAction::BookingAbandoned { ref booking } => {
                Self::apply_event(state, &action);
                tracing::info!(
                    booking_id = %booking.id,
                    participants = booking.current_participants,
                    "Payment window closed, booking abandoned"
                );
                metrics::counter!("bookings.abandoned").increment(1);
                SmallVec::new()
            },

            // ========== Reports and failures ==========
            BookingAction::NotificationSent { ref report } => {
                tracing::debug!(
                    booking_id = %report.booking_id,
                    kind = %report.kind,
                    delivered = report.delivered,
                    "Notification finished"
                );
                SmallVec::new()
            },

            BookingAction::BookingRejected { request_id, ref error } => {
                tracing::warn!(%request_id, %error, "Booking command rejected");
                Self::apply_event(state, &action);
                SmallVec::new()
            },

            BookingAction::ValidationFailed { .. } => {
                Self::apply_event(state, &action);
                SmallVec::new()
            },

            BookingAction::OperationFailed {
                booking_id,
                ref error,
            } => {
                tracing::error!(%booking_id, %error, "Booking follow-up failed");
                Self::apply_event(state, &action);
                SmallVec::new()
            },
        }
    }
}
