//! USB-MIDI keypad link
//!
//! Talks to the Macropad firmware through a pair of MIDI ports (see
//! [`super::protocol`]). A supervisor task polls for the ports, opens them
//! when they appear and drops them when they vanish, so unplugging and
//! replugging the keypad ends in a fresh `Connected` event.

use super::protocol::KeypadProtocol;
use super::{DeviceCommand, DeviceEvent, DeviceLink};
use crate::color::Color;
use crate::config::DeviceConfig;
use crate::keys::KeyIndex;
use crate::midi::{find_port_by_substring, format_hex, MidiMessage};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Byte sink towards the keypad
trait KeypadOutput {
    fn send(&mut self, bytes: &[u8]) -> Result<(), String>;
}

impl KeypadOutput for MidiOutputConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), String> {
        MidiOutputConnection::send(self, bytes).map_err(|e| e.to_string())
    }
}

/// Connection state shared between the link and its supervisor task
struct Shared {
    input_port: String,
    output_port: String,
    protocol: KeypadProtocol,
    midi_out: Mutex<Option<Box<dyn KeypadOutput>>>,
    midi_in: Mutex<Option<MidiInputConnection<()>>>,
    shutdown: AtomicBool,
}

// midir connections are only touched behind the mutexes above
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

/// Keypad reached over USB-MIDI
pub struct MidiKeypad {
    name: String,
    poll_interval: Duration,
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl MidiKeypad {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            name: format!("midi:{}", config.input_port),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(50)),
            shared: Arc::new(Shared {
                input_port: config.input_port.clone(),
                output_port: config.output_port.clone(),
                protocol: KeypadProtocol::new(config.channel, config.base_note),
                midi_out: Mutex::new(None),
                midi_in: Mutex::new(None),
                shutdown: AtomicBool::new(false),
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Check if both ports are open
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    fn send(&self, command: DeviceCommand) {
        self.shared.send(command);
    }
}

impl Shared {
    fn is_connected(&self) -> bool {
        self.midi_in.lock().is_some() && self.midi_out.lock().is_some()
    }

    /// Whether both keypad ports are currently enumerated
    fn ports_present(&self) -> bool {
        let input = MidiInput::new("Macropad-Bridge-Probe")
            .map(|midi_in| find_port_by_substring(&midi_in, &self.input_port).is_some());
        let output = MidiOutput::new("Macropad-Bridge-Probe")
            .map(|midi_out| find_port_by_substring(&midi_out, &self.output_port).is_some());

        matches!((input, output), (Ok(true), Ok(true)))
    }

    /// Open both ports, forwarding decoded input to `events`
    fn connect(&self, events: mpsc::Sender<DeviceEvent>) -> Result<()> {
        self.disconnect();

        let midi_in = MidiInput::new("Macropad-Bridge-Input").context("Failed to create MIDI input")?;
        let (in_port, in_name) = find_port_by_substring(&midi_in, &self.input_port)
            .ok_or_else(|| anyhow!("Input port '{}' not found", self.input_port))?;

        let protocol = self.protocol;
        let input_conn = midi_in
            .connect(
                &in_port,
                "macropad-bridge-in",
                move |_timestamp, data, _| {
                    trace!("Keypad RX: {}", format_hex(data));

                    let Some(event) = MidiMessage::parse(data).and_then(|m| protocol.decode(&m))
                    else {
                        trace!("Ignoring keypad message: {}", format_hex(data));
                        return;
                    };

                    // Runs on the MIDI thread: never block here
                    if let Err(e) = events.try_send(event) {
                        warn!("Dropping keypad event {:?}: {}", event, e);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to input port '{}': {}", in_name, e))?;

        let midi_out = MidiOutput::new("Macropad-Bridge-Output").context("Failed to create MIDI output")?;
        let (out_port, out_name) = find_port_by_substring(&midi_out, &self.output_port)
            .ok_or_else(|| anyhow!("Output port '{}' not found", self.output_port))?;

        let output_conn = midi_out
            .connect(&out_port, "macropad-bridge-out")
            .map_err(|e| anyhow!("Failed to connect to output port '{}': {}", out_name, e))?;

        *self.midi_in.lock() = Some(input_conn);
        *self.midi_out.lock() = Some(Box::new(output_conn));

        info!("Keypad ports open - Input: '{}', Output: '{}'", in_name, out_name);
        Ok(())
    }

    fn disconnect(&self) {
        let had_input = self.midi_in.lock().take().is_some();
        let had_output = self.midi_out.lock().take().is_some();
        if had_input || had_output {
            debug!("Keypad ports closed");
        }
    }

    /// Write a command; a failed write closes the ports
    ///
    /// A replug faster than the poll interval leaves handles to a port that
    /// no longer exists. Closing them lets the next poll reopen the keypad
    /// and emit `Connected`, which resyncs every key.
    fn send(&self, command: DeviceCommand) {
        let bytes = self.protocol.encode(&command).encode();

        let result = {
            let mut guard = self.midi_out.lock();
            let Some(conn) = guard.as_mut() else {
                trace!("Keypad offline, dropping {}", command);
                return;
            };
            conn.send(&bytes)
        };

        match result {
            Ok(()) => trace!("Keypad TX: {} | {}", format_hex(&bytes), command),
            Err(e) => {
                warn!("Failed to send {} to keypad: {}, closing ports", command, e);
                self.disconnect();
            }
        }
    }
}

async fn open_ports(shared: &Arc<Shared>, events: &mpsc::Sender<DeviceEvent>) -> Result<()> {
    let shared = shared.clone();
    let events = events.clone();
    tokio::task::spawn_blocking(move || shared.connect(events))
        .await
        .context("Keypad connect task failed")?
}

/// Poll for the keypad until shutdown
async fn supervise(shared: Arc<Shared>, events: mpsc::Sender<DeviceEvent>, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failed_attempts: u32 = 0;

    loop {
        ticker.tick().await;

        if shared.shutdown.load(Ordering::SeqCst) || events.is_closed() {
            break;
        }

        let connected = shared.is_connected();

        // Port enumeration and opening talk to the OS MIDI service
        let scanner = shared.clone();
        let present = tokio::task::spawn_blocking(move || scanner.ports_present())
            .await
            .unwrap_or(false);

        match (connected, present) {
            (false, true) => match open_ports(&shared, &events).await {
                Ok(()) => {
                    failed_attempts = 0;
                    info!("✅ Keypad connected");
                    if events.send(DeviceEvent::Connected).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    failed_attempts += 1;
                    if failed_attempts == 1 {
                        warn!("Keypad connection failed: {:#}", e);
                    } else {
                        debug!("Keypad connection attempt #{} failed: {:#}", failed_attempts, e);
                    }
                }
            },
            (true, false) => {
                shared.disconnect();
                warn!("⚠️  Keypad disconnected, waiting for it to come back");
            }
            _ => {}
        }
    }

    shared.disconnect();
    debug!("Keypad supervisor stopped");
}

#[async_trait]
impl DeviceLink for MidiKeypad {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, events: mpsc::Sender<DeviceEvent>) -> Result<()> {
        let mut supervisor = self.supervisor.lock();
        if supervisor.is_some() {
            return Err(anyhow!("Keypad link '{}' already started", self.name));
        }

        info!(
            "Watching for keypad - Input: '{}', Output: '{}' (poll {:?})",
            self.shared.input_port, self.shared.output_port, self.poll_interval
        );

        *supervisor = Some(tokio::spawn(supervise(
            self.shared.clone(),
            events,
            self.poll_interval,
        )));

        Ok(())
    }

    fn set_light(&self, key: KeyIndex, color: Color) {
        self.send(DeviceCommand::SetLight { key, color });
    }

    fn set_light_off(&self, key: KeyIndex) {
        self.send(DeviceCommand::SetLightOff { key });
    }

    async fn stop(&self) -> Result<()> {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
        self.shared.disconnect();
        info!("Keypad link '{}' stopped", self.name);
        Ok(())
    }
}
