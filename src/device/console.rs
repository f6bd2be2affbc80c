//! Console keypad - a hardware-free device link
//!
//! Logs every light command and keeps a journal of them. Presses and
//! reconnects are injected by hand, which makes it useful for:
//! - Running the bridge without a keypad (`--dry-run`)
//! - Driving the engine from the REPL
//! - Tests that assert on the exact command sequence

use super::{ButtonKind, DeviceCommand, DeviceEvent, DeviceLink};
use crate::color::Color;
use crate::keys::KeyIndex;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info};

pub struct ConsoleKeypad {
    name: String,
    /// Event sender, present between `start` and `stop`
    events: Mutex<Option<mpsc::Sender<DeviceEvent>>>,
    /// Every command received, in order
    journal: Mutex<Vec<DeviceCommand>>,
    journal_changed: Notify,
    /// Log each command at info level
    verbose: bool,
}

impl ConsoleKeypad {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Mutex::new(None),
            journal: Mutex::new(Vec::new()),
            journal_changed: Notify::new(),
            verbose: true,
        }
    }

    /// Same as `new` but logs commands at debug level only
    pub fn quiet(name: impl Into<String>) -> Self {
        Self {
            verbose: false,
            ..Self::new(name)
        }
    }

    /// Simulate a classified press
    pub async fn press(&self, key: i32, kind: ButtonKind) -> Result<()> {
        self.emit(DeviceEvent::Button { key, kind }).await
    }

    /// Simulate the keypad dropping off and coming back
    pub async fn reconnect(&self) -> Result<()> {
        info!("🔌 {} reconnecting", self.name);
        self.emit(DeviceEvent::Connected).await
    }

    /// Drain and return the command journal
    pub fn take_commands(&self) -> Vec<DeviceCommand> {
        std::mem::take(&mut *self.journal.lock())
    }

    /// Copy of the command journal
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.journal.lock().clone()
    }

    /// Wait until the journal holds at least `count` commands, then drain it
    pub async fn wait_for_commands(&self, count: usize) -> Vec<DeviceCommand> {
        loop {
            let changed = self.journal_changed.notified();
            {
                let mut journal = self.journal.lock();
                if journal.len() >= count {
                    return std::mem::take(&mut *journal);
                }
            }
            changed.await;
        }
    }

    async fn emit(&self, event: DeviceEvent) -> Result<()> {
        let tx = self
            .events
            .lock()
            .clone()
            .ok_or_else(|| anyhow!("Console keypad '{}' not started", self.name))?;

        tx.send(event)
            .await
            .map_err(|_| anyhow!("Console keypad '{}' event channel closed", self.name))
    }

    fn record(&self, command: DeviceCommand) {
        if self.verbose {
            info!("💡 {} {}", self.name, command);
        } else {
            debug!("{} {}", self.name, command);
        }

        self.journal.lock().push(command);
        self.journal_changed.notify_waiters();
    }
}

#[async_trait]
impl DeviceLink for ConsoleKeypad {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, events: mpsc::Sender<DeviceEvent>) -> Result<()> {
        info!("🔌 Console keypad '{}' starting", self.name);
        *self.events.lock() = Some(events.clone());

        // A console keypad is always attached
        events
            .send(DeviceEvent::Connected)
            .await
            .map_err(|_| anyhow!("Console keypad '{}' event channel closed", self.name))?;

        info!("✅ Console keypad '{}' connected", self.name);
        Ok(())
    }

    fn set_light(&self, key: KeyIndex, color: Color) {
        self.record(DeviceCommand::SetLight { key, color });
    }

    fn set_light_off(&self, key: KeyIndex) {
        self.record(DeviceCommand::SetLightOff { key });
    }

    async fn stop(&self) -> Result<()> {
        self.events.lock().take();
        info!(
            "Console keypad '{}' stopped ({} commands journaled)",
            self.name,
            self.journal.lock().len()
        );
        Ok(())
    }
}
