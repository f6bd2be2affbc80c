//! EngineHandle - public API for the SyncEngine
//!
//! Fire-and-forget methods for requests, async methods with oneshot
//! channels for queries. Commands sent from one handle are processed in
//! the order they were sent, so a query issued after a write observes it.

use super::commands::EngineCommand;
use super::subscribers::{NotificationReceiver, Subscribers};
use super::types::LightUpdate;
use crate::keys::{KeyIndex, KeyState};
use tokio::sync::{mpsc, oneshot};

/// Handle for interacting with the SyncEngine
///
/// Cheap to clone and share across tasks.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    subscribers: Subscribers,
}

impl EngineHandle {
    pub(super) fn new(
        cmd_tx: mpsc::UnboundedSender<EngineCommand>,
        subscribers: Subscribers,
    ) -> Self {
        Self {
            cmd_tx,
            subscribers,
        }
    }

    // =========================================================================
    // Requests (fire-and-forget)
    // =========================================================================

    /// Change one field of a key's light and push it to the device
    pub fn set_light(&self, key: KeyIndex, update: LightUpdate) {
        let _ = self.cmd_tx.send(EngineCommand::SetLight { key, update });
    }

    /// Run the identify animation
    pub fn identify(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Identify);
    }

    /// Stop the engine and its device link
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current state of one key, `None` if the engine is gone
    pub async fn key_state(&self, key: KeyIndex) -> Option<KeyState> {
        let (response, rx) = oneshot::channel();
        self.cmd_tx.send(EngineCommand::GetKey { key, response }).ok()?;
        rx.await.ok()
    }

    /// All key states in index order, empty if the engine is gone
    pub async fn snapshot(&self) -> Vec<KeyState> {
        let (response, rx) = oneshot::channel();
        if self.cmd_tx.send(EngineCommand::Snapshot { response }).is_err() {
            return Vec::new();
        }
        rx.await.map(|keys| keys.to_vec()).unwrap_or_default()
    }

    /// Whether the attention overlay is currently showing
    pub async fn is_identifying(&self) -> bool {
        let (response, rx) = oneshot::channel();
        if self.cmd_tx.send(EngineCommand::IsIdentifying { response }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Subscribe to forwarded button presses
    ///
    /// Each subscriber sees every press forwarded after this call exactly
    /// once, in arrival order. The queue is unbounded and closes when the
    /// engine stops.
    pub fn subscribe(&self) -> NotificationReceiver {
        self.subscribers.subscribe()
    }

    /// Returns false once the engine has stopped
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_clone() {
        fn assert_clone<T: Clone + Send + Sync>() {}
        assert_clone::<EngineHandle>();
    }

    #[tokio::test]
    async fn test_queries_on_closed_engine() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let handle = EngineHandle::new(tx, Subscribers::default());
        assert!(!handle.is_alive());
        assert!(handle.key_state(KeyIndex::new(0).unwrap()).await.is_none());
        assert!(handle.snapshot().await.is_empty());
        assert!(!handle.is_identifying().await);
    }
}
