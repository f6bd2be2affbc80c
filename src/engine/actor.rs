//! SyncEngine - actor owning the key state table
//!
//! All entry points (host light-control requests, identify, device events)
//! are serialized through this actor's run loop, so a mutate-then-push
//! sequence is atomic with respect to every other mutation.
//!
//! ```text
//!  EngineHandle ──commands──┐
//!                           ▼
//!  DeviceLink ──events──▶ SyncEngine ──set_light / set_light_off──▶ DeviceLink
//!                           │
//!                           └──ButtonNotification (per-subscriber queue)──▶ subscribers
//! ```

use super::commands::EngineCommand;
use super::handle::EngineHandle;
use super::subscribers::Subscribers;
use super::types::{ButtonNotification, EngineSettings, LightUpdate, SwitchEvent};
use crate::device::{ButtonKind, DeviceEvent, DeviceLink};
use crate::keys::{KeyIndex, KeyTable, KEY_COUNT};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

/// Capacity of the device event channel
pub const DEVICE_EVENT_CAPACITY: usize = 256;

/// Global engine mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Idle,
    /// Attention overlay is showing; state is restored at `restore_at`
    Identifying { restore_at: Instant },
}

impl EngineMode {
    fn restore_at(&self) -> Option<Instant> {
        match *self {
            EngineMode::Idle => None,
            EngineMode::Identifying { restore_at } => Some(restore_at),
        }
    }
}

pub struct SyncEngine {
    /// Authoritative light state
    keys: KeyTable,

    /// Hardware command sink
    device: Arc<dyn DeviceLink>,

    settings: EngineSettings,

    mode: EngineMode,

    /// Commands from handles
    command_rx: mpsc::UnboundedReceiver<EngineCommand>,

    /// Events from the device link
    device_rx: mpsc::Receiver<DeviceEvent>,

    /// Button notifications to subscribers
    subscribers: Subscribers,

    /// Device commands issued so far
    push_count: u64,
}

impl SyncEngine {
    /// Start `device`, spawn the engine and return a handle to it
    ///
    /// The device link is started here, exactly once, and stopped when the
    /// engine shuts down.
    pub async fn spawn(device: Arc<dyn DeviceLink>, settings: EngineSettings) -> Result<EngineHandle> {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();
        let (device_tx, device_rx) = mpsc::channel(DEVICE_EVENT_CAPACITY);
        let subscribers = Subscribers::default();

        device
            .start(device_tx)
            .await
            .with_context(|| format!("Failed to start device link '{}'", device.name()))?;

        let engine = SyncEngine {
            keys: KeyTable::new(),
            device,
            settings,
            mode: EngineMode::Idle,
            command_rx,
            device_rx,
            subscribers: subscribers.clone(),
            push_count: 0,
        };

        tokio::spawn(engine.run());

        info!("Sync engine spawned");

        Ok(EngineHandle::new(cmd_tx, subscribers))
    }

    /// Main run loop
    ///
    /// Exits on `Shutdown` or once every handle is dropped. A pending
    /// identify restore is dropped with the loop and never fires.
    async fn run(mut self) {
        debug!("Sync engine run loop started (device: {})", self.device.name());

        loop {
            let restore_at = self.mode.restore_at();

            tokio::select! {
                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!("All engine handles dropped");
                        break;
                    };
                    trace!(?cmd, "Processing command");
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                Some(event) = self.device_rx.recv() => {
                    trace!(?event, "Processing device event");
                    self.handle_device_event(event);
                }
                _ = sleep_until(restore_at.unwrap_or_else(Instant::now)), if restore_at.is_some() => {
                    self.finish_identify();
                }
            }
        }

        self.subscribers.close();

        if let Err(e) = self.device.stop().await {
            warn!("Failed to stop device link '{}': {:#}", self.device.name(), e);
        }

        info!("Sync engine stopped ({} device commands issued)", self.push_count);
    }

    /// Returns false when the loop should exit
    fn handle_command(&mut self, cmd: EngineCommand) -> bool {
        match cmd {
            EngineCommand::SetLight { key, update } => self.apply_light(key, update),
            EngineCommand::Identify => self.start_identify(),
            EngineCommand::GetKey { key, response } => {
                let _ = response.send(*self.keys.get(key));
            }
            EngineCommand::Snapshot { response } => {
                let _ = response.send(self.keys.snapshot());
            }
            EngineCommand::IsIdentifying { response } => {
                let _ = response.send(self.is_identifying());
            }
            EngineCommand::Shutdown => {
                info!("Sync engine shutting down");
                return false;
            }
        }
        true
    }

    fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Button { key, kind } => self.forward_button(key, kind),
            DeviceEvent::Connected => self.on_connected(),
        }
    }

    fn is_identifying(&self) -> bool {
        matches!(self.mode, EngineMode::Identifying { .. })
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Translate and forward a press; never touches light state
    fn forward_button(&self, raw_key: i32, kind: ButtonKind) {
        let Some(key) = KeyIndex::from_raw(raw_key) else {
            debug!("Discarding {} for out-of-range key {}", kind, raw_key);
            return;
        };

        info!("Button {} {}", key, kind);

        let notification = ButtonNotification {
            key,
            event: SwitchEvent::from(kind),
        };

        self.subscribers.publish(notification);
    }

    /// Commit a light-control request, then push the key
    ///
    /// While identifying the commit still happens but the push is left to
    /// the restore, which re-applies the whole table.
    fn apply_light(&mut self, key: KeyIndex, update: LightUpdate) {
        update.apply(self.keys.get_mut(key));
        debug!("Key {} {} -> {:?}", key, update, self.keys.get(key));

        if self.is_identifying() {
            debug!("Key {} push deferred until identify ends", key);
            return;
        }

        self.push(key);
    }

    fn on_connected(&mut self) {
        if self.is_identifying() {
            // The device came back blank; keep the overlay until restore
            info!("Keypad connected while identifying, re-applying attention color");
            self.show_attention();
        } else {
            info!("Keypad connected, resyncing {} keys", KEY_COUNT);
            self.resync();
        }
    }

    fn start_identify(&mut self) {
        if self.is_identifying() {
            info!("Identify requested again, restarting timer");
        } else {
            info!("Identify!");
        }

        self.mode = EngineMode::Identifying {
            restore_at: Instant::now() + self.settings.identify_duration,
        };
        self.show_attention();
    }

    fn finish_identify(&mut self) {
        self.mode = EngineMode::Idle;
        info!("Identify finished, restoring key lights");
        self.resync();
    }

    // =========================================================================
    // Device pushes
    // =========================================================================

    /// Apply one key's state to the device
    fn push(&mut self, key: KeyIndex) {
        let state = *self.keys.get(key);
        if state.on {
            self.device.set_light(key, state.color);
        } else {
            self.device.set_light_off(key);
        }
        self.push_count += 1;
    }

    /// Apply the whole table, in index order
    fn resync(&mut self) {
        for key in KeyIndex::all() {
            self.push(key);
        }
    }

    /// Overlay the attention color without touching the table
    fn show_attention(&mut self) {
        let color = self.settings.attention_color;
        for key in KeyIndex::all() {
            self.device.set_light(key, color);
            self.push_count += 1;
        }
    }
}
