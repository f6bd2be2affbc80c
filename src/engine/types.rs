//! Engine type definitions
//!
//! Notification, request and settings types that cross the engine boundary.

use crate::color::Color;
use crate::config::IdentifyConfig;
use crate::device::ButtonKind;
use crate::keys::{KeyIndex, KeyState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Programmable switch event, as exposed to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SwitchEvent {
    SinglePress,
    DoublePress,
    LongPress,
}

impl SwitchEvent {
    /// Discrete code carried by the host notification
    pub fn code(self) -> u8 {
        match self {
            SwitchEvent::SinglePress => 0,
            SwitchEvent::DoublePress => 1,
            SwitchEvent::LongPress => 2,
        }
    }
}

impl From<ButtonKind> for SwitchEvent {
    fn from(kind: ButtonKind) -> Self {
        match kind {
            ButtonKind::Single => SwitchEvent::SinglePress,
            ButtonKind::Double => SwitchEvent::DoublePress,
            ButtonKind::Long => SwitchEvent::LongPress,
        }
    }
}

impl From<SwitchEvent> for u8 {
    fn from(event: SwitchEvent) -> Self {
        event.code()
    }
}

impl TryFrom<u8> for SwitchEvent {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SwitchEvent::SinglePress),
            1 => Ok(SwitchEvent::DoublePress),
            2 => Ok(SwitchEvent::LongPress),
            other => Err(format!("invalid switch event code {}", other)),
        }
    }
}

/// A forwarded button press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ButtonNotification {
    pub key: KeyIndex,
    pub event: SwitchEvent,
}

/// One field of a light-control request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightUpdate {
    On(bool),
    Hue(f32),
    Saturation(f32),
    Value(f32),
}

impl LightUpdate {
    /// Write this field into `state`; color channels are clamped by `Color`
    pub fn apply(self, state: &mut KeyState) {
        match self {
            LightUpdate::On(on) => state.on = on,
            LightUpdate::Hue(hue) => state.color = state.color.with_hue(hue),
            LightUpdate::Saturation(s) => state.color = state.color.with_saturation(s),
            LightUpdate::Value(v) => state.color = state.color.with_value(v),
        }
    }
}

impl fmt::Display for LightUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightUpdate::On(on) => write!(f, "on={}", on),
            LightUpdate::Hue(h) => write!(f, "hue={}", h),
            LightUpdate::Saturation(s) => write!(f, "saturation={}", s),
            LightUpdate::Value(v) => write!(f, "value={}", v),
        }
    }
}

/// Engine tuning
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// How long the attention color stays up
    pub identify_duration: Duration,
    /// Color shown on every key while identifying
    pub attention_color: Color,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&IdentifyConfig::default())
    }
}

impl From<&IdentifyConfig> for EngineSettings {
    fn from(config: &IdentifyConfig) -> Self {
        Self {
            identify_duration: config.duration(),
            attention_color: config.color,
        }
    }
}
