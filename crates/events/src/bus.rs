//! In-process publish/subscribe abstraction (mechanics only).
//!
//! The engine uses a bus wherever one party announces something that several
//! others may care about: the browser profile announcing storage writes to
//! every open tab, and the admin editor announcing catalog changes to every
//! view in its tab.
//!
//! - **Broadcast semantics**: each subscription gets a copy of every message
//!   published after it subscribed.
//! - **Per-publisher ordering**: messages from one publisher arrive in publish
//!   order.
//! - **No persistence**: a message nobody is subscribed to is dropped.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::error::TryRecvError;

/// A subscription to a message stream.
///
/// ```ignore
/// let mut sub = bus.subscribe();
/// while let Some(msg) = sub.recv().await {
///     handle(msg);
/// }
/// // `None`: the bus was dropped.
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: UnboundedReceiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: UnboundedReceiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Take the next message if one is already queued.
    pub fn try_recv(&mut self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Transport-agnostic pub/sub bus.
///
/// `publish` never blocks. Implementations must be safe to share across tasks.
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
