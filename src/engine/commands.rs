//! Command enum for the sync engine actor
//!
//! Fire-and-forget commands carry no response channel; queries answer on a
//! oneshot channel.

use super::types::LightUpdate;
use crate::keys::{KeyIndex, KeyState, KEY_COUNT};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum EngineCommand {
    // -------------------------------------------------------------------------
    // Fire and forget
    // -------------------------------------------------------------------------
    /// Light-control request from the host side
    SetLight { key: KeyIndex, update: LightUpdate },

    /// Show the attention color on every key, then restore
    Identify,

    /// Stop the actor and its device link
    Shutdown,

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------
    GetKey {
        key: KeyIndex,
        response: oneshot::Sender<KeyState>,
    },

    Snapshot {
        response: oneshot::Sender<[KeyState; KEY_COUNT]>,
    },

    IsIdentifying {
        response: oneshot::Sender<bool>,
    },
}
