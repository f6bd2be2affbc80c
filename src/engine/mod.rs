//! Synchronization engine - authoritative per-key light state
//!
//! Forwards keypad presses as typed notifications, applies light-control
//! requests from the host, resyncs the keypad after every (re)connection
//! and runs the identify animation without disturbing stored state.

mod actor;
mod commands;
mod handle;
mod subscribers;
mod types;

#[cfg(test)]
mod tests;

pub use actor::{EngineMode, SyncEngine, DEVICE_EVENT_CAPACITY};
pub use handle::EngineHandle;
pub use subscribers::NotificationReceiver;
pub use types::{ButtonNotification, EngineSettings, LightUpdate, SwitchEvent};
