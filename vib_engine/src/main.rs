//! # Vibrator Engine Binary
//!
//! Drives a backend from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Vibrate for 500 ms on the simulation backend
//! vib_engine play 500
//!
//! # Play a two-step packet
//! vib_engine packet 8 100 5000 1200 0 200 0 1200 0
//!
//! # Backend details, verbose logging
//! vib_engine -v --driver simulation info
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use vib_common::config::{ConfigError, ConfigLoader, LogLevel, VibratorConfig};
use vib_common::consts::DEFAULT_CONFIG_PATH;
use vib_common::error::VibResult;
use vib_engine::controller::{Controller, PlaybackState};
use vib_engine::driver_registry::DriverRegistry;
use vib_engine::notifier::{NotifyStatus, VibEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Vibrator Engine - haptic actuator sequencing with pluggable backends
#[derive(Parser, Debug)]
#[command(name = "vib_engine")]
#[command(version)]
#[command(about = "Haptic actuator sequencing engine with pluggable backends")]
#[command(long_about = None)]
struct Args {
    /// Path to vibrator configuration file (defaults apply if missing)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Backend to load, overriding the config
    #[arg(short, long)]
    driver: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Vibrate for the given number of milliseconds
    Play {
        /// Duration in milliseconds (clamped to the configured maximum)
        ms: i64,
    },
    /// Load a packet in bulk format and play it
    Packet {
        /// Count followed by (time, intensity, frequency, overdrive) groups
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        values: Vec<i64>,
    },
    /// Show backend capabilities and calibration
    Info,
}

enum Signal {
    Event(VibEvent),
    Interrupt,
}

fn main() {
    if let Err(e) = run() {
        error!("vib_engine failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = load_config(&args);
    setup_tracing(&args, loaded.as_ref().map(|c| c.shared.log_level).ok());
    let mut config = loaded?;
    if let Some(driver) = &args.driver {
        config.driver = driver.clone();
    }

    info!("vib_engine v{} starting...", env!("CARGO_PKG_VERSION"));

    let registry = DriverRegistry::with_builtin();
    info!("available drivers: {:?}", registry.list_drivers());
    let ops = registry.create_driver(&config.driver)?;
    let controller = Controller::register(ops, &config)?;

    let (tx, rx) = mpsc::channel();
    let events = tx.clone();
    controller.notifier().register(Arc::new(move |ev: &VibEvent| {
        let _ = events.send(Signal::Event(*ev));
        NotifyStatus::Ok
    }));
    ctrlc::set_handler(move || {
        let _ = tx.send(Signal::Interrupt);
    })?;

    match args.command {
        Command::Play { ms } => {
            controller.request_timeout(ms)?;
            wait_for_idle(&controller, &rx)?;
        }
        Command::Packet { values } => {
            controller.load_packet_flat(&values)?;
            controller.request_timeout(1)?;
            wait_for_idle(&controller, &rx)?;
        }
        Command::Info => print_info(&controller),
    }

    let snapshot = controller.snapshot();
    println!("final state: {:?}", snapshot.playback);
    println!("output:      {:?}", snapshot.output);
    println!("stats:       {:?}", snapshot.stats);

    controller.unregister()?;
    info!("vib_engine shutdown complete");
    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(args: &Args) -> Result<VibratorConfig, ConfigError> {
    let config = match VibratorConfig::load(&args.config) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) => VibratorConfig::default(),
        Err(e) => return Err(e),
    };
    config.validate()?;
    Ok(config)
}

/// Print notifications until playback returns to idle or Ctrl-C arrives.
fn wait_for_idle(controller: &Controller, rx: &mpsc::Receiver<Signal>) -> VibResult<()> {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Signal::Event(ev)) => println!(
                "{} idx {} timeout {} ms",
                if ev.active { "ON " } else { "OFF" },
                ev.index,
                ev.timeout_ms
            ),
            Ok(Signal::Interrupt) => {
                info!("Received shutdown signal");
                return controller.disable();
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("notification channel closed");
                return Ok(());
            }
        }
        if controller.playback() == PlaybackState::Idle {
            return Ok(());
        }
    }
}

fn print_info(controller: &Controller) {
    let show = |label: &str, value: VibResult<String>| match value {
        Ok(v) => println!("{label:<26}{v}"),
        Err(e) => println!("{label:<26}({e})"),
    };
    println!("{:<26}{:?}", "capabilities:", controller.capabilities());
    show("motor type:", controller.motor_type());
    show("num waves:", controller.num_waves());
    show("intensity:", controller.intensity().map(|v| v.to_string()));
    show("frequency:", controller.frequency().map(|v| v.to_string()));
    show(
        "intensities:",
        controller.intensities().map(|a| format!("{:?}", a.as_slice())),
    );
    show(
        "haptic intensities:",
        controller
            .haptic_intensities()
            .map(|a| format!("{:?}", a.as_slice())),
    );
    show(
        "haptic durations:",
        controller
            .haptic_durations()
            .map(|a| format!("{:?}", a.as_slice())),
    );
    show("virtual composite idx:", controller.virtual_composite_indexes());
    show("virtual pwle idx:", controller.virtual_pwle_indexes());
    show(
        "event command:",
        controller.event_cmd().map(|c| c.to_string()),
    );
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: Option<LogLevel>) {
    let filter = EnvFilter::from_default_env();
    let filter = if args.verbose {
        filter.add_directive(Level::DEBUG.into())
    } else {
        let level = configured.unwrap_or_default();
        match level.as_directive().parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter.add_directive(Level::INFO.into()),
        }
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
