//! Periodic expiry sweep.
//!
//! Each booking schedules its own expiry when the payment window opens, but
//! those timers live in memory. The sweeper is the durable backstop: it
//! periodically asks the datastore for overdue bookings and sends each one
//! through the workflow. The same pass picks up pending bookings whose count
//! already meets the minimum, which happens when opening the window failed
//! and nobody joined since.

use crate::aggregates::BookingAction;
use crate::app::WorkflowStore;
use crate::store::StoreError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// Background task abandoning bookings whose payment window closed
pub struct ExpirySweeper {
    workflow: Arc<WorkflowStore>,
    interval: Duration,
    wait_timeout: Duration,
}

impl ExpirySweeper {
    /// Sweep every `interval`
    #[must_use]
    pub fn new(workflow: Arc<WorkflowStore>, interval: Duration) -> Self {
        Self {
            workflow,
            interval,
            wait_timeout: Duration::from_secs(10),
        }
    }

    /// Run one sweep
    ///
    /// Returns how many overdue bookings were sent for expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if overdue bookings cannot be listed.
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let env = self.workflow.environment();
        let overdue = env.store.list_expired(env.clock.now()).await?;

        for &booking_id in &overdue {
            if !self.dispatch(BookingAction::ExpireBooking { booking_id }).await {
                break;
            }
        }

        Ok(overdue.len())
    }

    /// Retry the payment window for pending bookings that already meet their minimum
    ///
    /// Returns how many bookings were sent for evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the bookings cannot be listed.
    pub async fn recheck_quorums(&self) -> Result<usize, StoreError> {
        let stalled = self.workflow.environment().store.list_stalled_quorums().await?;

        for &booking_id in &stalled {
            if !self.dispatch(BookingAction::EvaluateQuorum { booking_id }).await {
                break;
            }
        }

        Ok(stalled.len())
    }

    /// Send one action and wait for its cascade; false once the workflow is gone
    async fn dispatch(&self, action: BookingAction) -> bool {
        match self.workflow.send(action).await {
            Ok(mut handle) => {
                if handle.wait_with_timeout(self.wait_timeout).await.is_err() {
                    tracing::warn!("Sweep action still running after timeout");
                }
                true
            },
            Err(e) => {
                tracing::warn!(error = %e, "Workflow not accepting work, stopping sweep");
                false
            },
        }
    }

    /// Sweep until a shutdown signal arrives
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(0) => {},
                        Ok(count) => tracing::info!(count, "Expired overdue bookings"),
                        Err(e) => tracing::error!(error = %e, "Expiry sweep failed"),
                    }
                    match self.recheck_quorums().await {
                        Ok(0) => {},
                        Ok(count) => tracing::warn!(count, "Reopened stalled payment windows"),
                        Err(e) => tracing::error!(error = %e, "Quorum recheck failed"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Expiry sweeper stopping");
                    break;
                }
            }
        }
    }
}
