//! Keypad wire protocol over USB-MIDI
//!
//! The keypad firmware classifies presses itself and reports them as Note On
//! messages; lights are driven with a small SysEx vocabulary.
//!
//! ```text
//! keypad -> host   Note On  ch, note = base_note + key, velocity 1|2|3
//! keypad -> host   F0 7D 4D 50 00 F7                  hello (firmware booted)
//! host -> keypad   F0 7D 4D 50 01 <key> <r> <g> <b> F7  set light (7-bit RGB)
//! host -> keypad   F0 7D 4D 50 02 <key> F7              light off
//! ```

use super::{ButtonKind, DeviceCommand, DeviceEvent};
use crate::midi::MidiMessage;

/// Non-commercial SysEx manufacturer ID
pub const SYSEX_MANUFACTURER: u8 = 0x7D;

/// Protocol tag ("MP")
pub const SYSEX_TAG: [u8; 2] = [0x4D, 0x50];

const CMD_HELLO: u8 = 0x00;
const CMD_SET_LIGHT: u8 = 0x01;
const CMD_LIGHT_OFF: u8 = 0x02;

/// Encoder/decoder for one keypad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypadProtocol {
    /// MIDI channel (0-15)
    channel: u8,
    /// Note of key 0
    base_note: u8,
}

impl KeypadProtocol {
    /// `channel` is 1-based as written in config
    pub fn new(channel: u8, base_note: u8) -> Self {
        Self {
            channel: channel.clamp(1, 16) - 1,
            base_note: base_note & 0x7F,
        }
    }

    /// Decode an incoming message into a device event
    ///
    /// Key indices are passed through unchecked; a note below `base_note`
    /// yields a negative key, which the engine discards.
    pub fn decode(&self, message: &MidiMessage) -> Option<DeviceEvent> {
        match *message {
            MidiMessage::NoteOn { channel, note, velocity } if channel == self.channel => {
                let kind = kind_from_velocity(velocity)?;
                Some(DeviceEvent::Button {
                    key: i32::from(note) - i32::from(self.base_note),
                    kind,
                })
            }
            MidiMessage::SysEx { ref data } if is_hello(data) => Some(DeviceEvent::Connected),
            _ => None,
        }
    }

    /// Encode a light command
    pub fn encode(&self, command: &DeviceCommand) -> MidiMessage {
        let mut data = Vec::with_capacity(8);
        data.push(SYSEX_MANUFACTURER);
        data.extend_from_slice(&SYSEX_TAG);

        match *command {
            DeviceCommand::SetLight { key, color } => {
                let (r, g, b) = color.to_rgb();
                data.extend_from_slice(&[CMD_SET_LIGHT, key.get() as u8, r >> 1, g >> 1, b >> 1]);
            }
            DeviceCommand::SetLightOff { key } => {
                data.extend_from_slice(&[CMD_LIGHT_OFF, key.get() as u8]);
            }
        }

        MidiMessage::SysEx { data }
    }

    /// Message a keypad sends for a press
    pub fn encode_press(&self, key: u8, kind: ButtonKind) -> MidiMessage {
        MidiMessage::NoteOn {
            channel: self.channel,
            note: self.base_note.saturating_add(key) & 0x7F,
            velocity: velocity_for(kind),
        }
    }
}

fn kind_from_velocity(velocity: u8) -> Option<ButtonKind> {
    match velocity {
        1 => Some(ButtonKind::Single),
        2 => Some(ButtonKind::Double),
        3 => Some(ButtonKind::Long),
        _ => None,
    }
}

fn velocity_for(kind: ButtonKind) -> u8 {
    match kind {
        ButtonKind::Single => 1,
        ButtonKind::Double => 2,
        ButtonKind::Long => 3,
    }
}

fn is_hello(data: &[u8]) -> bool {
    matches!(data, [SYSEX_MANUFACTURER, t0, t1, CMD_HELLO] if [*t0, *t1] == SYSEX_TAG)
}
