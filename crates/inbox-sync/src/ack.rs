//! Deferred auto-acknowledgement of visible unread notifications.
//!
//! When the list view is visible with at least one unread notification, a
//! dwell timer arms; if it elapses without interruption every unread
//! notification is marked read. Hiding the view or a user-initiated
//! mark-all/delete cancels the pending cycle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::{NotificationStore, StoreEvent};

/// Timer lifecycle for one arming cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckTimerState {
    /// No cycle pending.
    Idle,
    /// Counting down; fires at `deadline` unless cancelled first.
    Armed { deadline: Instant },
    /// The dwell elapsed and mark-all-read was invoked. Terminal for the
    /// cycle.
    Fired,
    /// The cycle was pre-empted by hiding the view or a user action.
    /// Terminal for the cycle.
    Cancelled,
}

struct TimerInner {
    state: AckTimerState,
    /// Arming cycle counter; a settled cycle can never overwrite the state
    /// of a newer one.
    cycle: u64,
    cancel: Option<CancellationToken>,
}

/// One auto-acknowledge timer per store instance. Re-arming while armed
/// resets the deadline instead of stacking timers.
#[derive(Clone)]
pub struct AutoAcknowledgeTimer {
    store: Arc<NotificationStore>,
    dwell: Duration,
    inner: Arc<Mutex<TimerInner>>,
}

impl AutoAcknowledgeTimer {
    pub fn new(store: Arc<NotificationStore>, dwell: Duration) -> Self {
        Self {
            store,
            dwell,
            inner: Arc::new(Mutex::new(TimerInner {
                state: AckTimerState::Idle,
                cycle: 0,
                cancel: None,
            })),
        }
    }

    pub fn state(&self) -> AckTimerState {
        self.inner.lock().state
    }

    /// Begin (or reset) an arming cycle. Stays out of `Armed` when nothing
    /// is unread. Must be called within a tokio runtime.
    pub fn arm(&self) -> AckTimerState {
        if self.store.unread().current() == 0 {
            return self.state();
        }

        let events = self.store.subscribe();
        let (cycle, token, deadline) = {
            let mut inner = self.inner.lock();
            if let Some(previous) = inner.cancel.take() {
                previous.cancel();
            }
            inner.cycle += 1;
            let deadline = Instant::now() + self.dwell;
            inner.state = AckTimerState::Armed { deadline };
            let token = CancellationToken::new();
            inner.cancel = Some(token.clone());
            (inner.cycle, token, deadline)
        };

        debug!(cycle, dwell_ms = self.dwell.as_millis() as u64, "auto-acknowledge armed");
        let timer = self.clone();
        tokio::spawn(async move { timer.run_cycle(cycle, token, deadline, events).await });
        AckTimerState::Armed { deadline }
    }

    /// Cancel the pending cycle, if any. Used when the list view is hidden
    /// or unmounted.
    pub fn cancel(&self) {
        let token = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, AckTimerState::Armed { .. }) {
                return;
            }
            inner.state = AckTimerState::Cancelled;
            inner.cancel.take()
        };
        debug!("auto-acknowledge cancelled");
        if let Some(token) = token {
            token.cancel();
        }
    }

    async fn run_cycle(
        self,
        cycle: u64,
        token: CancellationToken,
        deadline: Instant,
        mut events: broadcast::Receiver<StoreEvent>,
    ) {
        tokio::select! {
            _ = token.cancelled() => {
                self.settle(cycle, AckTimerState::Cancelled);
            }
            _ = tokio::time::sleep_until(deadline) => {
                if self.settle(cycle, AckTimerState::Fired) {
                    debug!(cycle, "auto-acknowledge fired");
                    if let Err(error) = self.store.mark_all_read().await {
                        // The store already rolled the batch back.
                        warn!(%error, "auto-acknowledge commit failed");
                    }
                }
            }
            _ = Self::user_ack_action(&mut events) => {
                debug!(cycle, "auto-acknowledge pre-empted by user action");
                self.settle(cycle, AckTimerState::Cancelled);
            }
        }
    }

    /// Move this cycle to a terminal state unless a newer cycle took over
    /// or the state was already settled synchronously by `cancel`.
    fn settle(&self, cycle: u64, next: AckTimerState) -> bool {
        let mut inner = self.inner.lock();
        if inner.cycle != cycle || !matches!(inner.state, AckTimerState::Armed { .. }) {
            return false;
        }
        inner.state = next;
        inner.cancel = None;
        true
    }

    /// Resolves when a user-initiated mark-all-read or delete happens.
    async fn user_ack_action(events: &mut broadcast::Receiver<StoreEvent>) {
        loop {
            match events.recv().await {
                Ok(event) if event.cancels_auto_ack() => return,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                // Store dropped; leave resolution to the other branches.
                Err(broadcast::error::RecvError::Closed) => {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}
