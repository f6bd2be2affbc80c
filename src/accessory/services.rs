//! Service and characteristic descriptors published to the host
//!
//! One information service, then a programmable switch and a lightbulb for
//! each key. Key services carry the one-based label index the host uses to
//! order them.

use crate::config::AccessoryConfig;
use crate::keys::{KeyIndex, KEY_COUNT};
use serde::Serialize;
use serde_json::{json, Value};

/// Number of services an accessory publishes
pub const SERVICE_COUNT: usize = 1 + 2 * KEY_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceKind {
    AccessoryInformation,
    StatelessProgrammableSwitch,
    Lightbulb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CharacteristicKind {
    Identify,
    Manufacturer,
    Model,
    Name,
    SerialNumber,
    ServiceLabelIndex,
    ProgrammableSwitchEvent,
    On,
    Hue,
    Saturation,
    Brightness,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Characteristic {
    pub kind: CharacteristicKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    /// Discrete values the host may receive
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub valid_values: Vec<u8>,
    /// Fixed value, for static characteristics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Characteristic {
    fn new(kind: CharacteristicKind) -> Self {
        Self {
            kind,
            min: None,
            max: None,
            valid_values: Vec::new(),
            value: None,
        }
    }

    fn fixed(kind: CharacteristicKind, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::new(kind)
        }
    }

    fn ranged(kind: CharacteristicKind, min: f32, max: f32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::new(kind)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDescriptor {
    pub kind: ServiceKind,
    pub name: String,
    /// Distinguishes the per-key services of the same kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_index: Option<usize>,
    pub characteristics: Vec<Characteristic>,
}

impl ServiceDescriptor {
    pub fn has(&self, kind: CharacteristicKind) -> bool {
        self.characteristics.iter().any(|c| c.kind == kind)
    }
}

/// Build the full service list: information, then per key switch and light
pub fn build_services(info: &AccessoryConfig) -> Vec<ServiceDescriptor> {
    let mut services = Vec::with_capacity(SERVICE_COUNT);
    services.push(information_service(info));

    for key in KeyIndex::all() {
        services.push(switch_service(key));
    }
    for key in KeyIndex::all() {
        services.push(light_service(key));
    }

    services
}

fn information_service(info: &AccessoryConfig) -> ServiceDescriptor {
    use CharacteristicKind::*;

    ServiceDescriptor {
        kind: ServiceKind::AccessoryInformation,
        name: info.name.clone(),
        subtype: None,
        label_index: None,
        characteristics: vec![
            Characteristic::fixed(Name, json!(info.name)),
            Characteristic::fixed(Manufacturer, json!(info.manufacturer)),
            Characteristic::fixed(Model, json!(info.model)),
            Characteristic::fixed(SerialNumber, json!(info.serial_number)),
            Characteristic::new(Identify),
        ],
    }
}

fn switch_service(key: KeyIndex) -> ServiceDescriptor {
    let label = key.label();

    ServiceDescriptor {
        kind: ServiceKind::StatelessProgrammableSwitch,
        name: format!("Key {}", label),
        subtype: Some(format!("switch-{}", label)),
        label_index: Some(label),
        characteristics: vec![
            Characteristic::fixed(CharacteristicKind::ServiceLabelIndex, json!(label)),
            Characteristic {
                valid_values: vec![0, 1, 2],
                ..Characteristic::new(CharacteristicKind::ProgrammableSwitchEvent)
            },
        ],
    }
}

fn light_service(key: KeyIndex) -> ServiceDescriptor {
    use crate::color::{HUE_MAX, PERCENT_MAX};
    use CharacteristicKind::*;

    let label = key.label();

    ServiceDescriptor {
        kind: ServiceKind::Lightbulb,
        name: format!("Key {} Light", label),
        subtype: Some(format!("light-{}", label)),
        label_index: Some(label),
        characteristics: vec![
            Characteristic::new(On),
            Characteristic::ranged(Hue, 0.0, HUE_MAX),
            Characteristic::ranged(Saturation, 0.0, PERCENT_MAX),
            Characteristic::ranged(Brightness, 0.0, PERCENT_MAX),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_count() {
        let services = build_services(&AccessoryConfig::default());
        assert_eq!(services.len(), SERVICE_COUNT);
        assert_eq!(services.len(), 25);

        let count = |kind| services.iter().filter(|s| s.kind == kind).count();
        assert_eq!(count(ServiceKind::AccessoryInformation), 1);
        assert_eq!(count(ServiceKind::StatelessProgrammableSwitch), KEY_COUNT);
        assert_eq!(count(ServiceKind::Lightbulb), KEY_COUNT);
    }

    #[test]
    fn test_information_service() {
        let services = build_services(&AccessoryConfig::default());
        let info = &services[0];

        assert_eq!(info.kind, ServiceKind::AccessoryInformation);
        assert!(info.has(CharacteristicKind::Identify));

        let value = |kind| {
            info.characteristics
                .iter()
                .find(|c| c.kind == kind)
                .and_then(|c| c.value.clone())
        };
        assert_eq!(value(CharacteristicKind::Manufacturer), Some(json!("Adafruit")));
        assert_eq!(value(CharacteristicKind::Model), Some(json!("Macropad RP2040")));
        assert_eq!(value(CharacteristicKind::SerialNumber), Some(json!("Default-Serial")));
    }

    #[test]
    fn test_switch_labels() {
        let services = build_services(&AccessoryConfig::default());
        let switches: Vec<_> = services
            .iter()
            .filter(|s| s.kind == ServiceKind::StatelessProgrammableSwitch)
            .collect();

        for (i, switch) in switches.iter().enumerate() {
            assert_eq!(switch.name, format!("Key {}", i + 1));
            assert_eq!(switch.label_index, Some(i + 1));
            assert!(switch.has(CharacteristicKind::ProgrammableSwitchEvent));
            assert_eq!(switch.characteristics[0].value, Some(json!(i + 1)));
        }
    }

    #[test]
    fn test_light_ranges() {
        let services = build_services(&AccessoryConfig::default());
        let light = services
            .iter()
            .find(|s| s.kind == ServiceKind::Lightbulb)
            .unwrap();

        let hue = light
            .characteristics
            .iter()
            .find(|c| c.kind == CharacteristicKind::Hue)
            .unwrap();
        assert_eq!((hue.min, hue.max), (Some(0.0), Some(360.0)));

        let brightness = light
            .characteristics
            .iter()
            .find(|c| c.kind == CharacteristicKind::Brightness)
            .unwrap();
        assert_eq!(brightness.max, Some(100.0));
        assert!(light.has(CharacteristicKind::On));
    }
}
