//! Single-flight slot for session acquisitions.
//!
//! While one acquisition runs, every other caller waits for its result instead
//! of starting a second one. The slot is released as soon as the leader
//! finishes, fails or is dropped.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, OnceCell};

use super::error::SessionError;

type FlightResult<T> = Result<T, SessionError>;

struct FlightState<T> {
    result: OnceCell<FlightResult<T>>,
    notify: Notify,
}

impl<T: Clone> FlightState<T> {
    fn new() -> Self {
        Self {
            result: OnceCell::new(),
            notify: Notify::new(),
        }
    }

    fn set_result(&self, result: FlightResult<T>) {
        let _ = self.result.set(result);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> FlightResult<T> {
        loop {
            if let Some(result) = self.result.get() {
                return result.clone();
            }

            let notified = self.notify.notified();
            if let Some(result) = self.result.get() {
                return result.clone();
            }

            notified.await;
        }
    }
}

/// At most one running acquisition; concurrent callers share its outcome.
pub struct SingleFlight<T> {
    slot: Mutex<Option<Arc<FlightState<T>>>>,
}

impl<T: Clone> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Whether an acquisition is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Run `op` unless an acquisition is already running, in which case wait
    /// for that one and return its result.
    pub async fn run<F, Fut>(&self, op: F) -> FlightResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FlightResult<T>>,
    {
        let (state, is_leader) = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(existing) => (existing.clone(), false),
                None => {
                    let state = Arc::new(FlightState::new());
                    *slot = Some(state.clone());
                    (state, true)
                }
            }
        };

        if !is_leader {
            return state.wait().await;
        }

        let mut guard = LeaderGuard {
            flight: self,
            state,
            done: false,
        };
        let result = op().await;
        guard.finish(result.clone());
        result
    }

    fn release(&self, state: &Arc<FlightState<T>>) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, state)) {
            *slot = None;
        }
    }
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the slot when the leader completes or is dropped mid-flight.
struct LeaderGuard<'a, T: Clone> {
    flight: &'a SingleFlight<T>,
    state: Arc<FlightState<T>>,
    done: bool,
}

impl<T: Clone> LeaderGuard<'_, T> {
    fn finish(&mut self, result: FlightResult<T>) {
        self.flight.release(&self.state);
        self.state.set_result(result);
        self.done = true;
    }
}

impl<T: Clone> Drop for LeaderGuard<'_, T> {
    fn drop(&mut self) {
        if !self.done {
            self.flight.release(&self.state);
            self.state.set_result(Err(SessionError::Cancelled));
        }
    }
}
