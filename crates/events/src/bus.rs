//! Publish/subscribe abstraction (mechanics only).
//!
//! The bus is how a change in the remote store reaches every station that
//! watches the affected entity class. It is deliberately lightweight:
//!
//! - **Transport-agnostic**: in-memory channels, Redis pub/sub, ...
//! - **At-least-once, possibly dropped**: notifications only trigger a
//!   re-fetch, so duplicates are harmless and a missed notification is covered
//!   by periodic polling.
//! - **No persistence**: the store is the source of truth, never the bus.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// A subscription to a notification stream.
///
/// Dropping the subscription releases it: publishers detect the closed channel
/// on their next send and forget the subscriber.
///
/// ```ignore
/// let sub = bus.subscribe();
/// loop {
///     match sub.recv_timeout(Duration::from_millis(250)) {
///         Ok(msg) => handle(msg),
///         Err(RecvTimeoutError::Timeout) => continue, // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Broadcast pub/sub: each subscriber receives a copy of every published message.
///
/// `publish()` may fail (lock poisoning, network); callers decide whether the
/// failure matters. For store change notifications it never does, because the
/// write has already landed and pollers will pick it up.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
