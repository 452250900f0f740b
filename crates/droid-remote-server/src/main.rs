//! Droid-Remote server entry point.
//!
//! This binary accepts WebSocket connections from web browsers and lets them
//! drive Android devices through `adb`: key events, text, taps and swipes go
//! in; screen frames, device lists and scan results come out.
//!
//! # Usage
//!
//! ```text
//! droid-remote [OPTIONS]
//!
//! Options:
//!   --port <PORT>                 WebSocket listener port [default: 3000]
//!   --bind <IP>                   Listener address [default: 0.0.0.0]
//!   --adb <PATH>                  adb executable [default: adb]
//!   --config <FILE>               TOML config file
//!   --frame-interval-ms <MS>      Minimum spacing between frames [default: 100]
//!   --probe-timeout-ms <MS>       Per-probe connect timeout [default: 1000]
//!   --scan-port <PORT>            Port to scan (repeatable) [default: 5555]
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the `--config` file, then flags and environment
//! variables.  A flag beats its environment variable.
//!
//! | Variable              | Flag       |
//! |-----------------------|------------|
//! | `PORT`                | `--port`   |
//! | `DROID_REMOTE_BIND`   | `--bind`   |
//! | `DROID_REMOTE_ADB`    | `--adb`    |
//! | `DROID_REMOTE_CONFIG` | `--config` |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use droid_remote_server::domain::ServerConfig;
use droid_remote_server::infrastructure::config_file::validate;
use droid_remote_server::infrastructure::{load_config, run_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Browser-based remote control for Android devices over adb.
///
/// Every option is optional; unset options fall back to the config file and
/// then to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "droid-remote",
    about = "WebSocket server that lets a browser drive Android devices through adb",
    version
)]
struct Cli {
    /// TCP port for the WebSocket listener.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// IP address to bind the listener to.
    ///
    /// Use `127.0.0.1` to accept only local browsers.
    #[arg(long, env = "DROID_REMOTE_BIND")]
    bind: Option<String>,

    /// Path or name of the adb executable.
    #[arg(long, env = "DROID_REMOTE_ADB")]
    adb: Option<String>,

    /// TOML config file.
    #[arg(long, env = "DROID_REMOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Minimum spacing between screen captures, in milliseconds.
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Connect timeout for each scan probe, in milliseconds.
    #[arg(long)]
    probe_timeout_ms: Option<u64>,

    /// Port probed on every scanned host.  Repeat to scan several.
    #[arg(long = "scan-port")]
    scan_ports: Vec<u16>,
}

impl Cli {
    /// Resolves the final [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded, `--bind` is not
    /// an IP address, or the merged settings are invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = &self.bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            config.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(adb) = self.adb {
            config.adb_path = adb;
        }
        if let Some(ms) = self.frame_interval_ms {
            config.frame_interval_ms = ms;
        }
        if let Some(ms) = self.probe_timeout_ms {
            config.probe_timeout_ms = ms;
        }
        if !self.scan_ports.is_empty() {
            config.scan_ports = self.scan_ports;
        }

        validate(&config)?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    info!(
        "droid-remote starting: bind={}, adb={}, frame_interval={}ms",
        config.bind_addr, config.adb_path, config.frame_interval_ms
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    // The accept loop checks the flag every 200 ms and exits cleanly.
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("droid-remote stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
