//! The device bridge seam.
//!
//! Every interaction with a device goes through [`DeviceBridge`].  The
//! production implementation spawns `adb`
//! ([`crate::infrastructure::adb::AdbBridge`]); tests use
//! [`crate::infrastructure::mock::MockBridge`].
//!
//! Each method is one request/response round trip.  Implementations never
//! retry: a failure is returned to the caller, which relays it to the browser.

use async_trait::async_trait;
use droid_remote_core::DeviceRecord;
use thiserror::Error;

/// Substring of the bridge's `connect` output that confirms a connection.
///
/// `adb connect` prints `connected to <ip:port>` or
/// `already connected to <ip:port>` on success.
pub const CONNECTED_PHRASE: &str = "connected";

// ── Error type ────────────────────────────────────────────────────────────────

/// Failures reported by the device bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The bridge executable could not be started at all.
    #[error("failed to run {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// The bridge ran but exited non-zero or wrote diagnostics.
    ///
    /// The payload is the diagnostic text, relayed to the client verbatim.
    #[error("{0}")]
    Failed(String),
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// A single-shot passthrough to the external device-control tool.
///
/// `device_id` selects a device explicitly; `None` targets the bridge's
/// default device.  Instructions handed to [`DeviceBridge::invoke`] have
/// already passed the allow-list; implementations do not re-check them.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Runs a shell instruction on the device and returns its output.
    async fn invoke(&self, device_id: Option<&str>, instruction: &str)
        -> Result<String, BridgeError>;

    /// Lists attached devices.
    async fn invoke_list(&self) -> Result<Vec<DeviceRecord>, BridgeError>;

    /// Connects the bridge to a network device (`ip:port`), returning the
    /// tool's output.  Whether the output confirms a connection is decided by
    /// the caller (see [`CONNECTED_PHRASE`]).
    async fn connect(&self, target: &str) -> Result<String, BridgeError>;

    async fn disconnect(&self, device_id: &str) -> Result<String, BridgeError>;

    /// Captures one screen frame and returns it base64-encoded.
    ///
    /// `instruction` is the authorized screencap rendering.
    async fn capture_frame(
        &self,
        device_id: Option<&str>,
        instruction: &str,
    ) -> Result<String, BridgeError>;
}

/// Returns `true` when bridge `connect` output confirms a connection.
pub fn confirms_connection(output: &str) -> bool {
    output.contains(CONNECTED_PHRASE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_displays_diagnostic_verbatim() {
        let err = BridgeError::Failed("error: device 'D1' not found".to_string());
        assert_eq!(err.to_string(), "error: device 'D1' not found");
    }

    #[test]
    fn test_spawn_error_names_program() {
        let err = BridgeError::Spawn {
            program: "adb".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(err.to_string(), "failed to run adb: No such file or directory");
    }

    #[test]
    fn test_connect_output_confirmation() {
        assert!(confirms_connection("connected to 10.0.0.5:5555\n"));
        assert!(confirms_connection("already connected to 10.0.0.5:5555\n"));
        assert!(!confirms_connection("failed to connect to '10.0.0.5:5555': Connection refused\n"));
    }
}
