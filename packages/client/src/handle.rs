use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::types::Exchange;

/// The state of a dispatched request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// Request is in progress
    Pending,
    /// Request completed and the success callback was chosen
    Complete,
    /// Request completed and the failure callback was chosen
    Failed,
    /// Request was cancelled before it completed
    Aborted,
}

impl RequestState {
    pub fn is_pending(&self) -> bool {
        *self == RequestState::Pending
    }
}

/// Cancellation signal handed to a [`Transport`](crate::executor::Transport).
///
/// Blocking transports poll or wait on it; async ones race their exchange
/// against [`cancelled`](Self::cancelled).
#[derive(Clone, Default)]
pub struct Cancel {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    changed: Condvar,
    notify: Notify,
}

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn cancel(&self) {
        *self.flag() = true;
        self.inner.changed.notify_all();
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag()
    }

    /// Block for up to `timeout`. Returns `true` as soon as the signal fires.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.flag();
        while !*cancelled {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            cancelled = self
                .inner
                .changed
                .wait_timeout(cancelled, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for Cancel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancel")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// What the aborted callback learns about a cancelled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Abort {
    /// Id of the cancelled request's handle.
    pub id: u64,
    /// Whether the exchange had already been handed to the transport. The
    /// server may then have seen part or all of the request.
    pub in_flight: bool,
}

struct HandleState {
    state: RequestState,
    exchange: Option<Exchange>,
}

/// State shared between a [`RequestHandle`] and the thread running its exchange.
pub(crate) struct SharedHandle {
    state: Mutex<HandleState>,
    completed: Condvar,
    cancel: Cancel,
}

impl SharedHandle {
    fn new() -> Self {
        Self {
            state: Mutex::new(HandleState {
                state: RequestState::Pending,
                exchange: None,
            }),
            completed: Condvar::new(),
            cancel: Cancel::new(),
        }
    }

    pub(crate) fn cancel_signal(&self) -> &Cancel {
        &self.cancel
    }

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.lock().state == RequestState::Aborted
    }

    /// Record the final state unless the request was cancelled first.
    ///
    /// Returns `false` when the request had already been aborted; the caller
    /// must then deliver the aborted outcome instead.
    pub(crate) fn finish(&self, state: RequestState, exchange: Option<Exchange>) -> bool {
        let mut guard = self.lock();
        if guard.state != RequestState::Pending {
            return false;
        }
        guard.state = state;
        guard.exchange = exchange;
        self.completed.notify_all();
        true
    }

    fn abort(&self) -> bool {
        let mut guard = self.lock();
        if guard.state != RequestState::Pending {
            return false;
        }
        guard.state = RequestState::Aborted;
        self.completed.notify_all();
        drop(guard);
        self.cancel.cancel();
        true
    }
}

/// Handle to a dispatched request.
///
/// For synchronous requests the handle is already settled when returned. For
/// asynchronous requests it can be polled, waited on or cancelled while the
/// exchange runs on its worker thread.
pub struct RequestHandle {
    id: u64,
    shared: Arc<SharedHandle>,
    worker: Option<JoinHandle<()>>,
}

impl RequestHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            shared: Arc::new(SharedHandle::new()),
            worker: None,
        }
    }

    pub(crate) fn shared(&self) -> Arc<SharedHandle> {
        Arc::clone(&self.shared)
    }

    pub(crate) fn attach(&mut self, worker: JoinHandle<()>) {
        self.worker = Some(worker);
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.shared.lock().state
    }

    pub fn is_pending(&self) -> bool {
        self.state().is_pending()
    }

    /// The completed exchange, once there is one.
    pub fn exchange(&self) -> Option<Exchange> {
        self.shared.lock().exchange.clone()
    }

    /// Cancel the request.
    ///
    /// Returns `true` if the request was still pending. An exchange in flight
    /// is torn down and the aborted callback runs right away.
    pub fn cancel(&self) -> bool {
        let cancelled = self.shared.abort();
        if cancelled {
            log::debug!("Request {:016x} cancelled", self.id);
        }
        cancelled
    }

    /// Block until the request leaves the pending state.
    pub fn wait(&self) -> RequestState {
        let mut guard = self.shared.lock();
        while guard.state.is_pending() {
            guard = self
                .shared
                .completed
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        guard.state
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// Returns `None` if the request is still pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RequestState> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.lock();
        while guard.state.is_pending() {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (next, result) = self
                .shared
                .completed
                .wait_timeout(guard, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            guard = next;
            if result.timed_out() && guard.state.is_pending() {
                return None;
            }
        }
        Some(guard.state)
    }

    /// Block until the worker has run its callback, then return the final state.
    pub fn join(mut self) -> RequestState {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Request {:016x}: callback panicked", self.id);
            }
        }
        self.state()
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn new_handle_is_pending() {
        let handle = RequestHandle::new(7);
        assert_eq!(handle.id(), 7);
        assert!(handle.is_pending());
        assert!(handle.exchange().is_none());
    }

    #[test]
    fn finish_settles_once() {
        let handle = RequestHandle::new(0);
        let shared = handle.shared();
        assert!(shared.finish(RequestState::Complete, None));
        assert!(!shared.finish(RequestState::Failed, None));
        assert_eq!(handle.state(), RequestState::Complete);
    }

    #[test]
    fn cancel_wins_over_late_completion() {
        let handle = RequestHandle::new(0);
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(!handle.shared().finish(RequestState::Complete, None));
        assert_eq!(handle.state(), RequestState::Aborted);
        assert!(handle.shared().is_aborted());
    }

    #[test]
    fn cancel_after_completion_is_refused() {
        let handle = RequestHandle::new(0);
        handle.shared().finish(RequestState::Failed, None);
        assert!(!handle.cancel());
        assert_eq!(handle.state(), RequestState::Failed);
    }

    #[test]
    fn wait_returns_when_worker_finishes() {
        let mut handle = RequestHandle::new(1);
        let shared = handle.shared();
        handle.attach(thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            shared.finish(RequestState::Complete, None);
        }));
        assert_eq!(handle.wait(), RequestState::Complete);
        assert_eq!(handle.join(), RequestState::Complete);
    }

    #[test]
    fn wait_timeout_gives_up_on_pending() {
        let handle = RequestHandle::new(2);
        assert_eq!(handle.wait_timeout(Duration::from_millis(10)), None);
        handle.shared().finish(RequestState::Complete, None);
        assert_eq!(
            handle.wait_timeout(Duration::from_millis(10)),
            Some(RequestState::Complete)
        );
    }

    #[test]
    fn cancel_fires_signal() {
        let handle = RequestHandle::new(3);
        let signal = handle.shared().cancel_signal().clone();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(signal.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn signal_wait_wakes_early() {
        let signal = Cancel::new();
        let remote = signal.clone();
        let started = Instant::now();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        assert!(signal.wait_timeout(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(2));
        canceller.join().unwrap();
    }

    #[test]
    fn signal_wait_times_out() {
        assert!(!Cancel::new().wait_timeout(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn async_wait_sees_earlier_cancel() {
        let signal = Cancel::new();
        signal.cancel();
        signal.cancelled().await;
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RequestState::Aborted).unwrap(),
            r#""aborted""#
        );
    }
}
