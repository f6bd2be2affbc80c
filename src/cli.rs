//! Dry-run REPL
//!
//! Drives a console keypad and the accessory by hand: simulate presses and
//! reconnects on the device side, write lights and identify on the host
//! side, and print the key table.

use crate::accessory::{Accessory, CharacteristicValue, LightField};
use crate::device::{ButtonKind, ConsoleKeypad};
use anyhow::{anyhow, bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

const HELP: &str = "\
Commands:
  press <key> [single|double|long]   simulate a press on hardware key 0-11
  reconnect                          simulate the keypad reconnecting
  set <label> <field> <value>        host write, label 1-12, field on|hue|saturation|brightness
  identify                           host identify request
  state                              print every key
  help                               this text
  quit                               leave the REPL";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Press { key: i32, kind: ButtonKind },
    Reconnect,
    Set {
        label: usize,
        field: LightField,
        value: CharacteristicValue,
    },
    Identify,
    State,
    Help,
    Quit,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };

        let command = match verb.to_lowercase().as_str() {
            "press" | "p" => {
                let key = parts
                    .next()
                    .ok_or_else(|| anyhow!("usage: press <key> [single|double|long]"))?
                    .parse()
                    .context("key must be an integer")?;
                let kind = match parts.next() {
                    Some(kind) => kind.parse()?,
                    None => ButtonKind::Single,
                };
                ReplCommand::Press { key, kind }
            }
            "reconnect" => ReplCommand::Reconnect,
            "set" => {
                let (Some(label), Some(field), Some(value)) = (parts.next(), parts.next(), parts.next())
                else {
                    bail!("usage: set <label> <field> <value>");
                };
                ReplCommand::Set {
                    label: label.parse().context("label must be a positive integer")?,
                    field: field.parse()?,
                    value: parse_value(value)?,
                }
            }
            "identify" | "id" => ReplCommand::Identify,
            "state" | "s" => ReplCommand::State,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            other => bail!("unknown command '{}', try 'help'", other),
        };

        Ok(Some(command))
    }
}

fn parse_value(s: &str) -> Result<CharacteristicValue> {
    match s.to_lowercase().as_str() {
        "true" | "on" => Ok(CharacteristicValue::Bool(true)),
        "false" | "off" => Ok(CharacteristicValue::Bool(false)),
        other => other
            .parse()
            .map(CharacteristicValue::Number)
            .with_context(|| format!("'{}' is not a boolean or number", other)),
    }
}

/// Run the REPL until `quit` or end of input
pub async fn run_repl(keypad: Arc<ConsoleKeypad>, accessory: Arc<Accessory>) -> Result<()> {
    let (line_tx, line_rx) = mpsc::unbounded_channel();

    // rustyline blocks inside readline. A detached thread, unlike the
    // blocking pool, does not hold up runtime shutdown after `quit`.
    std::thread::Builder::new()
        .name("repl-input".to_string())
        .spawn(move || read_lines(line_tx))
        .context("Failed to start REPL input thread")?;

    println!("{}", HELP);

    run_commands(line_rx, &keypad, &accessory).await
}

fn read_lines(line_tx: mpsc::UnboundedSender<String>) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            warn!("Failed to open line editor: {}", e);
            return;
        }
    };

    loop {
        match rl.readline("macropad> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                if line_tx.send(line).is_err() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                warn!("REPL input failed: {}", e);
                break;
            }
        }
    }
}

/// Execute lines until `quit` or until the line source closes
pub async fn run_commands(
    mut lines: mpsc::UnboundedReceiver<String>,
    keypad: &ConsoleKeypad,
    accessory: &Accessory,
) -> Result<()> {
    while let Some(line) = lines.recv().await {
        let command = match ReplCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("error: {:#}", e);
                continue;
            }
        };

        if command == ReplCommand::Quit {
            break;
        }

        if let Err(e) = execute(&command, keypad, accessory).await {
            println!("error: {:#}", e);
        }
    }

    Ok(())
}

async fn execute(command: &ReplCommand, keypad: &ConsoleKeypad, accessory: &Accessory) -> Result<()> {
    match *command {
        ReplCommand::Press { key, kind } => keypad.press(key, kind).await?,
        ReplCommand::Reconnect => keypad.reconnect().await?,
        ReplCommand::Set {
            label,
            field,
            value,
        } => {
            if !accessory.set_light(label, field, value)? {
                println!("no key with label {}", label);
            }
        }
        ReplCommand::Identify => accessory.identify(),
        ReplCommand::State => {
            for light in accessory.lights().await {
                println!(
                    "Key {:>2}  {:<3}  hsv({}, {}%, {}%)",
                    light.label_index,
                    if light.on { "on" } else { "off" },
                    light.hue,
                    light.saturation,
                    light.brightness
                );
            }
        }
        ReplCommand::Help => println!("{}", HELP),
        ReplCommand::Quit => {}
    }
    Ok(())
}
