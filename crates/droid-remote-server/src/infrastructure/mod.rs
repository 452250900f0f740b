//! Infrastructure layer for droid-remote-server.
//!
//! The infrastructure layer handles all I/O: accepting WebSocket connections
//! from browsers, spawning `adb`, and opening probe sockets.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and performing the WebSocket upgrade handshake
//! - Running one session task per browser, plus its outbound writer
//! - Implementing [`DeviceBridge`] with the `adb` executable
//! - Implementing [`PortProber`] and [`InterfaceSource`] with real sockets
//! - Loading the TOML config file
//!
//! # What does NOT belong here?
//!
//! - Command validation or session state (that is the application layer)
//! - Message type definitions (that is the domain layer)
//!
//! [`DeviceBridge`]: crate::application::DeviceBridge
//! [`PortProber`]: crate::application::PortProber
//! [`InterfaceSource`]: crate::application::InterfaceSource

use std::sync::Arc;

use crate::application::{NetworkScanner, Services};
use crate::domain::config::ServerConfig;

pub mod adb;
pub mod config_file;
pub mod mock;
pub mod net;
pub mod ws_server;

pub use adb::AdbBridge;
pub use config_file::{load_config, ConfigError};
pub use net::{SystemInterfaces, TcpProber};
pub use ws_server::{run_server, serve};

/// Wires the production collaborators described by `config`.
pub fn production_services(config: &ServerConfig) -> Services {
    let bridge = Arc::new(AdbBridge::new(config.adb_path.clone()));
    let scanner = NetworkScanner::new(
        bridge.clone(),
        Arc::new(TcpProber),
        Arc::new(SystemInterfaces),
        config.scan_ports.clone(),
        config.probe_timeout(),
    );
    Services {
        bridge,
        scanner: Arc::new(scanner),
        frame_interval: config.frame_interval(),
    }
}
