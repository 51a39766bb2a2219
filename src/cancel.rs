//! One-shot broadcast cancellation.
//!
//! A [`CancellationToken`] starts unset and is set exactly once by an
//! external actor. Every clone observes the same state. Waiting is done by
//! selecting on [`CancellationToken::signal`], a channel that is never sent
//! on and becomes permanently ready once its only sender is dropped.

use crossbeam::channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a receive that races cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received<T> {
    /// A value arrived from upstream
    Item(T),
    /// Upstream closed its end of the stream
    Closed,
    /// Cancellation was observed first
    Cancelled,
}

/// Outcome of a send that races cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sent {
    /// A receiver took the value
    Delivered,
    /// The receiving side is gone
    Closed,
    /// Cancellation was observed first
    Cancelled,
}

struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// Shared, observe-only shutdown indicator
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create an unset token
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                signal,
            }),
        }
    }

    /// Set the token. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        // Dropping the sender disconnects `signal`, waking every selector.
        self.inner.trigger.lock().take();
    }

    /// Check whether the token has been set
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Selectable handle that becomes ready once the token is set
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Block until the token is set or `timeout` elapses.
    /// Returns true if the token was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        select! {
            recv(self.inner.signal) -> _ => true,
            default(timeout) => self.is_cancelled(),
        }
    }

    /// Receive one value from `rx`, giving up as soon as the token is set
    pub fn recv<T>(&self, rx: &Receiver<T>) -> Received<T> {
        if self.is_cancelled() {
            return Received::Cancelled;
        }
        select! {
            recv(rx) -> msg => match msg {
                Ok(value) => Received::Item(value),
                Err(_) => Received::Closed,
            },
            recv(self.inner.signal) -> _ => Received::Cancelled,
        }
    }

    /// Hand `value` to whoever is receiving on `tx`, giving up as soon as
    /// the token is set
    pub fn send<T>(&self, tx: &Sender<T>, value: T) -> Sent {
        if self.is_cancelled() {
            return Sent::Cancelled;
        }
        select! {
            send(tx, value) -> res => match res {
                Ok(()) => Sent::Delivered,
                Err(_) => Sent::Closed,
            },
            recv(self.inner.signal) -> _ => Sent::Cancelled,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
