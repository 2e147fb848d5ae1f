//! Companion Daemon - Headless Host for the Companion Core
//!
//! Wires the interaction event system and the streaming chat pipeline to the
//! real synthesis backend. Every action the companion produces is written to
//! stdout as one JSON line; chat input is read from stdin.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (backend at 127.0.0.1:8001)
//! companion-daemon
//!
//! # Different backend, no idle chatter
//! companion-daemon --base-url 192.168.1.20:8001 --no-idle
//!
//! # Fire greetings right away to check the wiring
//! companion-daemon --trigger time.morning --trigger festival.christmas
//!
//! # Verbose logging
//! RUST_LOG=debug companion-daemon
//! ```
//!
//! # Input
//!
//! Each stdin line is sent as a chat message, except:
//!
//! - `/interrupt`: stop the current reply
//! - `/clear`: forget the conversation
//! - `/status`: log the coordinator status
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown (so does EOF on stdin)

mod host;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use companion_core::{default_config_path, load_config_from_path, ConfigOverrides};

use host::CompanionHost;

/// Companion Daemon - headless host for the desktop companion
#[derive(Parser, Debug)]
#[command(name = "companion-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "COMPANION_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend host and port
    #[arg(short = 'b', long, value_name = "HOST:PORT")]
    base_url: Option<String>,

    /// Disable idle chatter
    #[arg(long)]
    no_idle: bool,

    /// Playback volume (0.0 - 1.0)
    #[arg(long, value_name = "LEVEL")]
    volume: Option<f32>,

    /// Log every bus event at debug level
    #[arg(long)]
    debug_events: bool,

    /// Event to fire right after start (repeatable)
    #[arg(short = 't', long = "trigger", value_name = "EVENT")]
    triggers: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "COMPANION_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.base_url {
            overrides = overrides.with_base_url(url.clone());
        }
        if self.no_idle {
            overrides = overrides.with_idle_event(false);
        }
        if let Some(volume) = self.volume {
            overrides = overrides.with_volume(volume);
        }
        if self.debug_events {
            overrides = overrides.with_debug_events(true);
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "companion_daemon={level},companion_core={level}"
        ))
    });

    // stdout carries actions; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            info!("Received SIGINT, initiating shutdown");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("Companion daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path)
        .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        source = %config.source(),
        backend = %config.server.origin(),
        idle = config.interaction.idle.enabled,
        "Configuration resolved"
    );

    let host = CompanionHost::new(config)?;
    host.start(&args.triggers);

    let result = tokio::select! {
        result = host.run() => result,
        result = shutdown_signal() => result,
    };

    info!("Shutting down...");
    host.shutdown();

    match result {
        Ok(()) => {
            info!("Companion daemon stopped cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Daemon stopped with error");
            Err(e)
        }
    }
}
