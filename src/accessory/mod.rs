//! Exposition adapter - the engine as a smart-home accessory
//!
//! Presents the keypad as one accessory with an information service and,
//! per key, a stateless programmable switch plus a lightbulb. Keys are
//! addressed by their one-based label index at this boundary.
//!
//! Host writes are converted into [`LightUpdate`]s and handed to the
//! engine; button notifications come back as [`SwitchNotification`]s.

mod services;

pub use services::{
    build_services, Characteristic, CharacteristicKind, ServiceDescriptor, ServiceKind,
    SERVICE_COUNT,
};

use crate::config::AccessoryConfig;
use crate::engine::{ButtonNotification, EngineHandle, LightUpdate, NotificationReceiver};
use crate::keys::{KeyIndex, KeyState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// Errors converting host values into light-control requests
#[derive(Debug, Error, PartialEq)]
pub enum AccessoryError {
    #[error("unknown light characteristic '{0}' (on, hue, saturation, brightness)")]
    UnknownField(String),

    #[error("{field} expects {expected}, got {value}")]
    InvalidValue {
        field: LightField,
        expected: &'static str,
        value: String,
    },
}

/// Writable characteristics of a key's lightbulb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightField {
    On,
    Hue,
    Saturation,
    Brightness,
}

impl LightField {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightField::On => "on",
            LightField::Hue => "hue",
            LightField::Saturation => "saturation",
            LightField::Brightness => "brightness",
        }
    }

    /// Read this field out of a key state
    pub fn read(self, state: &KeyState) -> CharacteristicValue {
        match self {
            LightField::On => CharacteristicValue::Bool(state.on),
            LightField::Hue => CharacteristicValue::Number(state.color.hue()),
            LightField::Saturation => CharacteristicValue::Number(state.color.saturation()),
            LightField::Brightness => CharacteristicValue::Number(state.color.value()),
        }
    }

    /// Convert a host value into an engine request
    pub fn to_update(self, value: CharacteristicValue) -> Result<LightUpdate, AccessoryError> {
        match (self, value) {
            (LightField::On, CharacteristicValue::Bool(on)) => Ok(LightUpdate::On(on)),
            // Hosts commonly send 0/1 for booleans
            (LightField::On, CharacteristicValue::Number(n)) if n == 0.0 || n == 1.0 => {
                Ok(LightUpdate::On(n == 1.0))
            }
            (LightField::Hue, CharacteristicValue::Number(n)) => Ok(LightUpdate::Hue(n)),
            (LightField::Saturation, CharacteristicValue::Number(n)) => {
                Ok(LightUpdate::Saturation(n))
            }
            (LightField::Brightness, CharacteristicValue::Number(n)) => Ok(LightUpdate::Value(n)),
            (field, value) => Err(AccessoryError::InvalidValue {
                field,
                expected: if field == LightField::On {
                    "a boolean"
                } else {
                    "a number"
                },
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for LightField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightField {
    type Err = AccessoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on" => Ok(LightField::On),
            "hue" => Ok(LightField::Hue),
            "saturation" => Ok(LightField::Saturation),
            "brightness" | "value" => Ok(LightField::Brightness),
            other => Err(AccessoryError::UnknownField(other.to_string())),
        }
    }
}

/// Characteristic value as exchanged with the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacteristicValue {
    Bool(bool),
    Number(f32),
}

impl fmt::Display for CharacteristicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacteristicValue::Bool(b) => write!(f, "{}", b),
            CharacteristicValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Full lightbulb state of one key, host units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightStatus {
    pub label_index: usize,
    pub on: bool,
    pub hue: f32,
    pub saturation: f32,
    pub brightness: f32,
}

impl LightStatus {
    fn new(key: KeyIndex, state: &KeyState) -> Self {
        Self {
            label_index: key.label(),
            on: state.on,
            hue: state.color.hue(),
            saturation: state.color.saturation(),
            brightness: state.color.value(),
        }
    }
}

/// `ProgrammableSwitchEvent` update for the switch with `label_index`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwitchNotification {
    pub label_index: usize,
    pub value: u8,
}

impl From<ButtonNotification> for SwitchNotification {
    fn from(n: ButtonNotification) -> Self {
        Self {
            label_index: n.key.label(),
            value: n.event.code(),
        }
    }
}

/// Subscription to switch notifications
///
/// Each subscription sees every press after it was created, in order.
pub struct SwitchNotifications {
    rx: NotificationReceiver,
}

impl SwitchNotifications {
    /// Next notification, `None` once the engine has stopped
    pub async fn next(&mut self) -> Option<SwitchNotification> {
        self.rx.recv().await.map(SwitchNotification::from)
    }
}

/// Accessory description served to the host
#[derive(Debug, Clone, Serialize)]
pub struct AccessoryDescription<'a> {
    pub name: &'a str,
    pub manufacturer: &'a str,
    pub model: &'a str,
    pub serial_number: &'a str,
    pub services: &'a [ServiceDescriptor],
}

/// The keypad as seen by the host
pub struct Accessory {
    info: AccessoryConfig,
    services: Vec<ServiceDescriptor>,
    engine: EngineHandle,
}

impl Accessory {
    pub fn new(info: AccessoryConfig, engine: EngineHandle) -> Self {
        let services = build_services(&info);
        info!(
            "Accessory '{}' ({} {}) publishing {} services",
            info.name,
            info.manufacturer,
            info.model,
            services.len()
        );
        Self {
            info,
            services,
            engine,
        }
    }

    pub fn describe(&self) -> AccessoryDescription<'_> {
        AccessoryDescription {
            name: &self.info.name,
            manufacturer: &self.info.manufacturer,
            model: &self.info.model,
            serial_number: &self.info.serial_number,
            services: &self.services,
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    /// Host identify request
    pub fn identify(&self) {
        info!("Identify requested for '{}'", self.info.name);
        self.engine.identify();
    }

    /// Read one characteristic; `None` for an unknown label
    pub async fn get_light(&self, label: usize, field: LightField) -> Option<CharacteristicValue> {
        let key = Self::key_for(label)?;
        let state = self.engine.key_state(key).await?;
        Some(field.read(&state))
    }

    /// Read a key's whole lightbulb; `None` for an unknown label
    pub async fn light(&self, label: usize) -> Option<LightStatus> {
        let key = Self::key_for(label)?;
        let state = self.engine.key_state(key).await?;
        Some(LightStatus::new(key, &state))
    }

    /// All lightbulbs in label order
    pub async fn lights(&self) -> Vec<LightStatus> {
        self.engine
            .snapshot()
            .await
            .iter()
            .zip(KeyIndex::all())
            .map(|(state, key)| LightStatus::new(key, state))
            .collect()
    }

    /// Write one characteristic
    ///
    /// Returns `Ok(false)` without touching the engine for an unknown
    /// label, whatever the value; for a known label a value of the wrong
    /// type is an error.
    pub fn set_light(
        &self,
        label: usize,
        field: LightField,
        value: CharacteristicValue,
    ) -> Result<bool, AccessoryError> {
        let Some(key) = Self::key_for(label) else {
            return Ok(false);
        };
        let update = field.to_update(value)?;

        debug!("Host set key {} {} = {}", label, field, value);
        self.engine.set_light(key, update);
        Ok(true)
    }

    pub fn notifications(&self) -> SwitchNotifications {
        SwitchNotifications {
            rx: self.engine.subscribe(),
        }
    }

    fn key_for(label: usize) -> Option<KeyIndex> {
        let key = KeyIndex::from_label(label);
        if key.is_none() {
            debug!("Discarding request for unknown key label {}", label);
        }
        key
    }
}
