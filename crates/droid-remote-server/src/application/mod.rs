//! Application layer for droid-remote-server.
//!
//! The application layer orchestrates the business logic: it knows *what* to
//! do, but delegates *how* to do it to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - The per-connection [`Session`] state machine and request dispatch
//! - The self-pacing [`ScreenStreamer`] task
//! - The concurrent [`NetworkScanner`] and its exactly-once completion
//! - The seams ([`DeviceBridge`], [`PortProber`], [`InterfaceSource`]) that
//!   infrastructure implements
//!
//! # What does NOT belong here?
//!
//! - Spawning `adb` or opening sockets (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod bridge;
pub mod scanner;
pub mod session;
pub mod streamer;

pub use bridge::{confirms_connection, BridgeError, DeviceBridge, CONNECTED_PHRASE};
pub use scanner::{InterfaceSource, NetworkScanner, PortProber, ProbeResult, ScanError};
pub use session::{Services, Session, SessionState};
pub use streamer::{CaptureHandle, ScreenStreamer};
