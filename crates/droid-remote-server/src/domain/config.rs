//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for runtime settings.  It
//! starts from [`Default`], may be overlaid by a TOML file (see
//! `infrastructure::config_file`), and finally by CLI flags in `main.rs`.
//!
//! Every field carries a serde default, so a config file only needs to name
//! the settings it changes:
//!
//! ```toml
//! bind_addr = "127.0.0.1:3000"
//! adb_path = "/opt/platform-tools/adb"
//! frame_interval_ms = 200
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port probed when scanning for devices with adb over TCP enabled.
pub const DEFAULT_ADB_TCP_PORT: u16 = 5555;

/// All runtime configuration for the server.
///
/// Build this once at startup and share it behind an `Arc`.
///
/// ```rust
/// use droid_remote_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 3000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Path or name of the adb executable.
    pub adb_path: String,

    /// Minimum spacing between screen captures, in milliseconds.
    pub frame_interval_ms: u64,

    /// Connect timeout for each scan probe, in milliseconds.
    pub probe_timeout_ms: u64,

    /// TCP ports probed on every scanned host.
    pub scan_ports: Vec<u16>,

    /// Capacity of each session's outbound event queue.
    ///
    /// When the browser reads slowly the queue fills and the screen streamer
    /// waits for space instead of piling up frames.
    pub event_buffer: usize,
}

impl ServerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ServerConfig {
    /// | Field             | Default        |
    /// |-------------------|----------------|
    /// | bind_addr         | `0.0.0.0:3000` |
    /// | adb_path          | `adb`          |
    /// | frame_interval_ms | 100            |
    /// | probe_timeout_ms  | 1000           |
    /// | scan_ports        | `[5555]`       |
    /// | event_buffer      | 64             |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            adb_path: "adb".to_string(),
            frame_interval_ms: 100,
            probe_timeout_ms: 1000,
            scan_ports: vec![DEFAULT_ADB_TCP_PORT],
            event_buffer: 64,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
