//! Keypad device links
//!
//! A [`DeviceLink`] is the engine's only view of the hardware: an event
//! source (button presses, connect notifications) and a fire-and-forget
//! command sink (per-key color, per-key off).

use crate::color::Color;
use crate::keys::KeyIndex;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

pub mod console;
pub mod midi;
pub mod protocol;

pub use console::ConsoleKeypad;
pub use midi::MidiKeypad;

/// Press classification, resolved by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonKind {
    #[serde(alias = "single_press")]
    Single,
    #[serde(alias = "double_press")]
    Double,
    #[serde(alias = "long_press")]
    Long,
}

impl ButtonKind {
    pub fn all() -> &'static [ButtonKind] {
        &[ButtonKind::Single, ButtonKind::Double, ButtonKind::Long]
    }

    /// Human readable name used in logs
    pub fn describe(&self) -> &'static str {
        match self {
            ButtonKind::Single => "single press",
            ButtonKind::Double => "double press",
            ButtonKind::Long => "long press",
        }
    }
}

impl fmt::Display for ButtonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

impl std::str::FromStr for ButtonKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "single" | "s" => Ok(ButtonKind::Single),
            "double" | "d" => Ok(ButtonKind::Double),
            "long" | "l" => Ok(ButtonKind::Long),
            other => anyhow::bail!("Unknown press kind '{}' (single, double, long)", other),
        }
    }
}

/// Event emitted by a device link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A classified press; `key` is untrusted and may be out of range
    Button { key: i32, kind: ButtonKind },
    /// The device was (re)connected and its light registers are unknown
    Connected,
}

/// Command sent to the device, as recorded by links that journal them
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DeviceCommand {
    SetLight { key: KeyIndex, color: Color },
    SetLightOff { key: KeyIndex },
}

impl DeviceCommand {
    pub fn key(&self) -> KeyIndex {
        match *self {
            DeviceCommand::SetLight { key, .. } | DeviceCommand::SetLightOff { key } => key,
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCommand::SetLight { key, color } => write!(f, "key {} -> {}", key, color),
            DeviceCommand::SetLightOff { key } => write!(f, "key {} -> off", key),
        }
    }
}

/// Keypad abstraction used by the sync engine
///
/// All methods take `&self` so links can live behind `Arc<dyn DeviceLink>`;
/// implementations use interior mutability for connection state.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Link name for logs (e.g. "midi:Macropad", "console")
    fn name(&self) -> &str;

    /// Begin pumping events into `events`
    ///
    /// Called exactly once by the owner. Must emit [`DeviceEvent::Connected`]
    /// after every successful (re)connection, including the first.
    async fn start(&self, events: mpsc::Sender<DeviceEvent>) -> Result<()>;

    /// Show `color` on `key`. Never blocks, never reports failure.
    fn set_light(&self, key: KeyIndex, color: Color);

    /// Power the backlight of `key` off. Never blocks, never reports failure.
    fn set_light_off(&self, key: KeyIndex);

    /// Release the transport
    async fn stop(&self) -> Result<()>;
}
