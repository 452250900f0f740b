//! droid-remote-server library crate.
//!
//! This crate provides a WebSocket server that lets a web browser drive an
//! Android device through the `adb` bridge: inject key events, text, taps and
//! swipes, stream the screen, and discover devices on the local subnet.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (JSON over WebSocket)
//!         ↕
//! [droid-remote-server]
//!   ├── domain/           Pure types: JSON message enums, ServerConfig
//!   ├── application/      Session state machine, screen streamer, network scanner
//!   └── infrastructure/
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         ├── adb/        adb subprocess bridge
//!         └── net/        TCP probes and interface enumeration
//!         ↕
//! adb → Android device
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` talks to the outside world only through the
//!   [`application::DeviceBridge`], [`application::PortProber`] and
//!   [`application::InterfaceSource`] traits, so it is testable without a
//!   device or a network.
//! - `infrastructure` supplies the real implementations of those traits plus
//!   the WebSocket transport.

/// Domain layer: pure message and configuration types (no I/O).
pub mod domain;

/// Application layer: sessions, streaming, and scanning.
pub mod application;

/// Infrastructure layer: WebSocket server, adb subprocesses, sockets.
pub mod infrastructure;
