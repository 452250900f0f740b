//! Domain layer for droid-remote-server.
//!
//! Pure types with no dependencies on I/O, networking, or the async runtime:
//!
//! - Message types (the JSON "language" between browser and server)
//! - Configuration structures

pub mod config;
pub mod messages;

pub use config::ServerConfig;
pub use messages::{ClientRequest, ServerEvent};
