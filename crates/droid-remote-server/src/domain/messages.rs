//! JSON message types for the browser-facing WebSocket protocol.
//!
//! # Message flow
//!
//! ```text
//! Browser → Server:  JSON text frame  →  ClientRequest
//! Server  → Browser: ServerEvent      →  JSON text frame
//! ```
//!
//! # JSON discriminant
//!
//! Every message is a JSON object with a `"type"` field naming the event in
//! camelCase; all other fields are flattened into the same object, also in
//! camelCase:
//!
//! ```json
//! {"type":"sendTap","deviceId":"emulator-5554","x":540,"y":960}
//! {"type":"commandResponse","success":true,"output":""}
//! ```
//!
//! Responses always carry `success`; a failure additionally carries `error`
//! so the browser never has to infer failure from missing data.

use droid_remote_core::DeviceRecord;
use serde::{Deserialize, Serialize};

// ── Browser → Server ──────────────────────────────────────────────────────────

/// All messages a browser can send.
///
/// `deviceId` is optional on input requests; when absent (or empty) the
/// bridge's default device is targeted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    /// A raw shell instruction, checked against the allow-list.
    SendCommand {
        #[serde(default)]
        device_id: Option<String>,
        command: String,
    },

    /// Free text to type on the device.
    SendText {
        #[serde(default)]
        device_id: Option<String>,
        text: String,
    },

    SendTap {
        #[serde(default)]
        device_id: Option<String>,
        x: i32,
        y: i32,
    },

    SendSwipe {
        #[serde(default)]
        device_id: Option<String>,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        /// Milliseconds; 300 when absent.
        #[serde(default)]
        duration: Option<u32>,
    },

    StartScreenCapture {
        #[serde(default)]
        device_id: Option<String>,
    },

    StopScreenCapture,

    ListDevices,

    /// Connect the bridge to a network device (`ip:port`).
    ConnectToDevice {
        #[serde(default)]
        device_id: String,
    },

    DisconnectDevice {
        #[serde(default)]
        device_id: String,
    },

    /// Scan a `/24` for devices; the first interface's subnet when absent.
    ScanNetwork {
        #[serde(default)]
        network_range: Option<String>,
    },
}

impl ClientRequest {
    /// Returns the variant name for log lines, without field values.
    ///
    /// Text payloads may contain passwords typed on the device, so request
    /// bodies are never logged.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientRequest::SendCommand { .. } => "sendCommand",
            ClientRequest::SendText { .. } => "sendText",
            ClientRequest::SendTap { .. } => "sendTap",
            ClientRequest::SendSwipe { .. } => "sendSwipe",
            ClientRequest::StartScreenCapture { .. } => "startScreenCapture",
            ClientRequest::StopScreenCapture => "stopScreenCapture",
            ClientRequest::ListDevices => "listDevices",
            ClientRequest::ConnectToDevice { .. } => "connectToDevice",
            ClientRequest::DisconnectDevice { .. } => "disconnectDevice",
            ClientRequest::ScanNetwork { .. } => "scanNetwork",
        }
    }
}

// ── Server → Browser ──────────────────────────────────────────────────────────

/// All messages the server sends to a browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Reply to `sendCommand`, `sendText`, `sendTap` and `sendSwipe`.
    CommandResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// One captured frame: a base64-encoded PNG.
    ScreenData { data: String },

    ScreenCaptureStopped,

    DevicesList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        devices: Option<Vec<DeviceRecord>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    ConnectResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        device_id: String,
    },

    /// Reply to `disconnectDevice`; `deviceId` is echoed for reconciliation.
    DisconnectResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        device_id: String,
    },

    /// Human-readable scan status line.
    ScanStatus { status: String },

    /// Scan progress in percent, once per resolved probe.
    ScanProgress { progress: u8 },

    /// An open port that the bridge confirmed as a device.
    DeviceDiscovered {
        device_id: String,
        ip: String,
        port: u16,
    },

    /// Every `ip:port` found open, verified or not.
    ScanComplete { devices: Vec<String> },

    /// A frame the server could not understand.
    Error { message: String },
}

impl ServerEvent {
    pub fn command_ok(output: String) -> Self {
        ServerEvent::CommandResponse {
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn command_err(error: impl Into<String>) -> Self {
        ServerEvent::CommandResponse {
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn devices_ok(devices: Vec<DeviceRecord>) -> Self {
        ServerEvent::DevicesList {
            devices: Some(devices),
            error: None,
        }
    }

    pub fn devices_err(error: impl Into<String>) -> Self {
        ServerEvent::DevicesList {
            devices: None,
            error: Some(error.into()),
        }
    }

    pub fn scan_status(status: impl Into<String>) -> Self {
        ServerEvent::ScanStatus {
            status: status.into(),
        }
    }

    /// Returns the wire name of the event, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::CommandResponse { .. } => "commandResponse",
            ServerEvent::ScreenData { .. } => "screenData",
            ServerEvent::ScreenCaptureStopped => "screenCaptureStopped",
            ServerEvent::DevicesList { .. } => "devicesList",
            ServerEvent::ConnectResponse { .. } => "connectResponse",
            ServerEvent::DisconnectResponse { .. } => "disconnectResponse",
            ServerEvent::ScanStatus { .. } => "scanStatus",
            ServerEvent::ScanProgress { .. } => "scanProgress",
            ServerEvent::DeviceDiscovered { .. } => "deviceDiscovered",
            ServerEvent::ScanComplete { .. } => "scanComplete",
            ServerEvent::Error { .. } => "error",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
