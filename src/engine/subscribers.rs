//! Button notification fan-out
//!
//! Each subscriber owns an unbounded queue, so a slow reader never loses
//! presses. Registration is synchronous: a press forwarded after
//! `subscribe` returns always reaches the new subscriber.

use super::types::ButtonNotification;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub type NotificationReceiver = mpsc::UnboundedReceiver<ButtonNotification>;

#[derive(Default)]
struct Registry {
    senders: Vec<mpsc::UnboundedSender<ButtonNotification>>,
    /// Set once the engine stops; later subscribers get a closed queue
    closed: bool,
}

/// Subscriber list shared by the engine and its handles
#[derive(Clone, Default)]
pub struct Subscribers {
    inner: Arc<Mutex<Registry>>,
}

impl Subscribers {
    pub fn subscribe(&self) -> NotificationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.inner.lock();
        if !registry.closed {
            registry.senders.push(tx);
        }
        rx
    }

    /// Deliver to every live subscriber, pruning dropped ones
    pub fn publish(&self, notification: ButtonNotification) {
        let mut registry = self.inner.lock();
        let before = registry.senders.len();
        registry.senders.retain(|tx| tx.send(notification).is_ok());

        let pruned = before - registry.senders.len();
        if pruned > 0 {
            debug!("Dropped {} closed notification subscriber(s)", pruned);
        }
    }

    /// End every subscription
    pub fn close(&self) {
        let mut registry = self.inner.lock();
        registry.closed = true;
        registry.senders.clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().senders.len()
    }
}
