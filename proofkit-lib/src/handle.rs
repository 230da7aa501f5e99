//! Pending-result handles.
//!
//! A handle is what a caller holds while awaiting the response for one
//! correlation id. Exactly one of resolved / rejected / timed-out /
//! cancelled becomes true, and only once; every transition attempted after
//! the first is a no-op. Any number of concurrent awaiters observe the same
//! outcome.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::errors::ProofkitError;
use crate::response::Response;
use crate::Result;

#[derive(Debug)]
enum HandleState {
    Pending,
    Resolved(Response),
    Rejected(ProofkitError),
    TimedOut,
    Cancelled(String),
}

/// An awaitable slot for exactly one terminal outcome.
pub struct ProofHandle {
    state: Mutex<HandleState>,
    notify: Notify,
}

impl ProofHandle {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HandleState::Pending),
            notify: Notify::new(),
        })
    }

    /// A handle that rejects itself with [`ProofkitError::Timeout`] if still
    /// pending when `timeout` elapses. The timer starts now, independent of
    /// any connection state.
    pub(crate) fn with_timeout(timeout: Duration) -> Arc<Self> {
        let handle = Self::new();
        let timer = Arc::clone(&handle);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timer.settle(HandleState::TimedOut);
        });
        handle
    }

    /// The single transition point. Returns true when this call moved the
    /// handle out of `Pending`; a handle that is already terminal is inert.
    fn settle(&self, next: HandleState) -> bool {
        let mut state = self.state.lock().expect("handle state lock poisoned");
        if !matches!(*state, HandleState::Pending) {
            return false;
        }
        *state = next;
        drop(state);
        self.notify.notify_waiters();
        true
    }

    /// Resolve with a response. Returns false if the handle was already
    /// terminal (late duplicates are ignored).
    pub fn resolve(&self, response: Response) -> bool {
        self.settle(HandleState::Resolved(response))
    }

    /// Reject with an error.
    pub fn reject(&self, error: ProofkitError) -> bool {
        self.settle(HandleState::Rejected(error))
    }

    /// Cancel with a reason; awaiters see [`ProofkitError::Cancelled`].
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.settle(HandleState::Cancelled(reason.into()))
    }

    /// Whether a terminal state has been reached.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            *self.state.lock().expect("handle state lock poisoned"),
            HandleState::Pending
        )
    }

    /// Snapshot of the outcome, if any.
    pub fn try_result(&self) -> Option<Result<Response>> {
        let state = self.state.lock().expect("handle state lock poisoned");
        match &*state {
            HandleState::Pending => None,
            HandleState::Resolved(response) => Some(Ok(response.clone())),
            HandleState::Rejected(error) => Some(Err(error.clone())),
            HandleState::TimedOut => Some(Err(ProofkitError::Timeout)),
            HandleState::Cancelled(reason) => Some(Err(ProofkitError::Cancelled(reason.clone()))),
        }
    }

    /// Wait for the terminal outcome.
    pub async fn await_result(&self) -> Result<Response> {
        loop {
            // Register interest before checking, so a transition between the
            // check and the await cannot be missed.
            let notified = self.notify.notified();
            if let Some(outcome) = self.try_result() {
                return outcome;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for ProofHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("handle state lock poisoned");
        let label = match &*state {
            HandleState::Pending => "pending",
            HandleState::Resolved(_) => "resolved",
            HandleState::Rejected(_) => "rejected",
            HandleState::TimedOut => "timed-out",
            HandleState::Cancelled(_) => "cancelled",
        };
        write!(f, "ProofHandle({label})")
    }
}
