//! Macropad Bridge
//!
//! Exposes a 12-key RGB macropad to a smart-home host: key presses become
//! programmable switch events, key backlights become lightbulbs.

use anyhow::Result;
use clap::Parser;
use macropad_bridge::accessory::Accessory;
use macropad_bridge::api::{self, ApiState};
use macropad_bridge::cli;
use macropad_bridge::config::AppConfig;
use macropad_bridge::device::{ConsoleKeypad, DeviceLink, MidiKeypad};
use macropad_bridge::engine::{EngineHandle, EngineSettings, SyncEngine};
use macropad_bridge::midi;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Macropad Bridge - 12-key RGB macropad as a smart-home accessory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Run without hardware, driving a console keypad from a REPL
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.log_json)?;

    info!("Starting Macropad Bridge v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load_or_default(&args.config).await?;

    if args.list_ports {
        midi::list_ports_formatted(&config.device.input_port);
        return Ok(());
    }

    let settings = EngineSettings::from(&config.identify);

    let console = args
        .dry_run
        .then(|| Arc::new(ConsoleKeypad::new("console")));
    let device: Arc<dyn DeviceLink> = match &console {
        Some(keypad) => {
            info!("Dry run: using console keypad");
            keypad.clone()
        }
        None => Arc::new(MidiKeypad::new(&config.device)),
    };

    let engine = SyncEngine::spawn(device, settings).await?;
    let accessory = Arc::new(Accessory::new(config.accessory.clone(), engine.clone()));

    let api_task = if config.api.enabled {
        let state = Arc::new(ApiState {
            accessory: accessory.clone(),
        });
        let bind = config.api.bind.clone();
        let port = config.api.port;
        Some(tokio::spawn(async move {
            if let Err(e) = api::start_server(state, &bind, port).await {
                error!("API server failed: {:#}", e);
            }
        }))
    } else {
        info!("Host API disabled");
        None
    };

    match console {
        Some(keypad) => {
            tokio::select! {
                result = cli::run_repl(keypad, accessory) => {
                    if let Err(e) = result {
                        error!("REPL failed: {:#}", e);
                    }
                }
                _ = shutdown_signal() => {}
            }
        }
        None => shutdown_signal().await,
    }

    if let Some(task) = api_task {
        task.abort();
    }
    stop_engine(&engine).await;

    info!("Macropad Bridge shutdown complete");
    Ok(())
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            // Without a handler there is nothing to wait for
            warn!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Ask the engine to stop and give it a moment to release the keypad
async fn stop_engine(engine: &EngineHandle) {
    engine.shutdown();

    let stopped = tokio::time::timeout(Duration::from_secs(2), async {
        while engine.is_alive() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    if stopped.is_err() {
        warn!("Sync engine did not stop within 2s");
    }
}
