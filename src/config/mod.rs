//! Configuration management for Macropad Bridge
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working setup for a stock Macropad RP2040.

use crate::color::Color;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub accessory: AccessoryConfig,
    pub identify: IdentifyConfig,
    pub api: ApiConfig,
}

/// Keypad transport configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Input port name (substring match)
    pub input_port: String,
    /// Output port name (substring match)
    pub output_port: String,
    /// MIDI channel the firmware reports presses on (1-16)
    pub channel: u8,
    /// Note number of key 0
    pub base_note: u8,
    /// How often to look for the keypad ports
    pub poll_interval_ms: u64,
}

/// Accessory information shown to the host
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessoryConfig {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

/// Identify animation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentifyConfig {
    pub duration_ms: u64,
    pub color: Color,
}

/// Host HTTP/WebSocket API
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            input_port: default_port_name(),
            output_port: default_port_name(),
            channel: 1,
            base_note: 36,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            name: "MacroPad".to_string(),
            manufacturer: "Adafruit".to_string(),
            model: "Macropad RP2040".to_string(),
            serial_number: "Default-Serial".to_string(),
        }
    }
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3000,
            color: Color::ATTENTION,
        }
    }
}

impl IdentifyConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0".to_string(),
            port: crate::api::DEFAULT_API_PORT,
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is missing
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            tracing::warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty map
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.device.input_port.trim().is_empty() {
            anyhow::bail!("device.input_port cannot be empty");
        }
        if self.device.output_port.trim().is_empty() {
            anyhow::bail!("device.output_port cannot be empty");
        }
        if self.device.channel == 0 || self.device.channel > 16 {
            anyhow::bail!(
                "device.channel {} is invalid (must be 1-16)",
                self.device.channel
            );
        }
        // Twelve consecutive notes must fit in 0-127
        if self.device.base_note > 127 - (crate::keys::KEY_COUNT as u8 - 1) {
            anyhow::bail!(
                "device.base_note {} is invalid (must be 0-116)",
                self.device.base_note
            );
        }

        if self.accessory.name.trim().is_empty() {
            anyhow::bail!("accessory.name cannot be empty");
        }

        if self.identify.duration_ms == 0 {
            anyhow::bail!("identify.duration_ms must be greater than 0");
        }

        if self.api.enabled && self.api.port == 0 {
            anyhow::bail!("api.port must be set when the API is enabled");
        }

        Ok(())
    }
}

fn default_port_name() -> String {
    "Macropad".to_string()
}
