//! MIDI utilities and message types
//!
//! Provides the subset of MIDI message parsing and encoding the keypad
//! transport speaks, plus port discovery helpers.

use anyhow::Result;
use midir::{MidiIO, MidiInput, MidiOutput};
use std::fmt;

/// MIDI message types understood by the keypad transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// System Exclusive payload, without the F0/F7 framing
    SysEx { data: Vec<u8> },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes
    ///
    /// Returns `None` for running status, truncated messages and message
    /// types the keypad never sends.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        match status & 0xF0 {
            0x80 => {
                if data.len() < 3 { return None; }
                Some(MidiMessage::NoteOff {
                    channel: status & 0x0F,
                    note: data[1] & 0x7F,
                    velocity: data[2] & 0x7F,
                })
            }
            0x90 => {
                // Note On (velocity 0 = Note Off)
                if data.len() < 3 { return None; }
                let channel = status & 0x0F;
                let note = data[1] & 0x7F;
                let velocity = data[2] & 0x7F;

                if velocity == 0 {
                    Some(MidiMessage::NoteOff { channel, note, velocity: 0 })
                } else {
                    Some(MidiMessage::NoteOn { channel, note, velocity })
                }
            }
            0xF0 if status == 0xF0 => {
                // System Exclusive - find the end (0xF7)
                let end = data.iter().position(|&b| b == 0xF7)?;
                Some(MidiMessage::SysEx { data: data[1..end].to_vec() })
            }
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::SysEx { ref data } => {
                let mut result = Vec::with_capacity(data.len() + 2);
                result.push(0xF0);
                result.extend(data.iter().map(|b| b & 0x7F));
                result.push(0xF7);
                result
            }
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::SysEx { ref data } => {
                write!(f, "SysEx {} bytes", data.len())
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find a port whose name contains `pattern` (case-insensitive)
pub fn find_port_by_substring<T: MidiIO>(io: &T, pattern: &str) -> Option<(T::Port, String)> {
    let pattern = pattern.to_lowercase();
    io.ports().into_iter().find_map(|port| {
        let name = io.port_name(&port).ok()?;
        name.to_lowercase().contains(&pattern).then_some((port, name))
    })
}

/// Names of all MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("Macropad-Bridge-Scanner")?;
    Ok(port_names(&midi_in))
}

/// Names of all MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new("Macropad-Bridge-Scanner")?;
    Ok(port_names(&midi_out))
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

/// Print available ports, highlighting the ones matching `pattern`
pub fn list_ports_formatted(pattern: &str) {
    use colored::*;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    let needle = pattern.to_lowercase();
    let print_group = |title: &str, ports: Result<Vec<String>>| {
        println!("\n{}", title.bold());
        match ports {
            Ok(ports) if ports.is_empty() => println!("  {}", "No ports found".dimmed()),
            Ok(ports) => {
                for name in ports {
                    if name.to_lowercase().contains(&needle) {
                        println!("  {} {}", "[KEYPAD]".green(), name.bright_white());
                    } else {
                        println!("  {}", name);
                    }
                }
            }
            Err(e) => println!("  {}", format!("Failed to list ports: {}", e).red()),
        }
    };

    print_group("Input Ports:", list_input_ports());
    print_group("Output Ports:", list_output_ports());

    println!();
}
