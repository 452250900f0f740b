//! Per-connection session state.
//!
//! A [`Session`] is created when a browser connects and torn down when it
//! disconnects.  It processes one [`ClientRequest`] at a time and owns the
//! long-running work started on the browser's behalf:
//!
//! ```text
//!            startScreenCapture            stopScreenCapture / teardown
//!   Idle ───────────────────────▶ Capturing ─────────────────────────▶ Idle
//!                                  │    ▲
//!                                  └────┘ startScreenCapture (old loop cancelled first)
//! ```
//!
//! Scans run alongside and do not affect the state.  Every request that can
//! fail is answered with an event carrying an explicit `error`; no failure
//! ends the session.

use std::sync::Arc;
use std::time::Duration;

use droid_remote_core::{CommandError, DeviceCommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::bridge::{confirms_connection, DeviceBridge};
use crate::application::scanner::NetworkScanner;
use crate::application::streamer::{CaptureHandle, ScreenStreamer};
use crate::domain::messages::{ClientRequest, ServerEvent};

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct Services {
    pub bridge: Arc<dyn DeviceBridge>,
    pub scanner: Arc<NetworkScanner>,
    pub frame_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
}

/// Server-side state for one browser connection.
pub struct Session {
    id: Uuid,
    services: Services,
    events: mpsc::Sender<ServerEvent>,
    active_device_id: Option<String>,
    capture: Option<CaptureHandle>,
    scans: Vec<JoinHandle<()>>,
}

impl Session {
    /// Creates a session whose events (responses, frames, scan updates) are
    /// all delivered through `events`.
    pub fn new(services: Services, events: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            services,
            events,
            active_device_id: None,
            capture: None,
            scans: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        match self.capture {
            Some(_) => SessionState::Capturing,
            None => SessionState::Idle,
        }
    }

    /// The last device selector a request used.
    pub fn active_device_id(&self) -> Option<&str> {
        self.active_device_id.as_deref()
    }

    /// Number of scans still running.
    pub fn running_scans(&self) -> usize {
        self.scans.iter().filter(|scan| !scan.is_finished()).count()
    }

    /// Processes one request, queuing its response (if any).
    pub async fn handle(&mut self, request: ClientRequest) {
        debug!(session = %self.id, request = request.kind(), "request");

        let response = match request {
            ClientRequest::SendCommand { device_id, command } => {
                Some(self.dispatch_command(device_id, &command).await)
            }
            ClientRequest::SendText { device_id, text } => {
                Some(self.dispatch_text(device_id, &text).await)
            }
            ClientRequest::SendTap { device_id, x, y } => {
                Some(self.dispatch_tap(device_id, x, y).await)
            }
            ClientRequest::SendSwipe {
                device_id,
                x1,
                y1,
                x2,
                y2,
                duration,
            } => Some(self.dispatch_swipe(device_id, x1, y1, x2, y2, duration).await),
            ClientRequest::StartScreenCapture { device_id } => {
                self.start_capture(device_id);
                None
            }
            ClientRequest::StopScreenCapture => Some(self.stop_capture()),
            ClientRequest::ListDevices => Some(self.list_devices().await),
            ClientRequest::ConnectToDevice { device_id } => {
                Some(self.connect_device(&device_id).await)
            }
            ClientRequest::DisconnectDevice { device_id } => {
                Some(self.disconnect_device(&device_id).await)
            }
            ClientRequest::ScanNetwork { network_range } => {
                self.scan_network(network_range);
                None
            }
        };

        if let Some(event) = response {
            if self.events.send(event).await.is_err() {
                debug!(session = %self.id, "response dropped, outbound queue closed");
            }
        }
    }

    // ── Input dispatch ────────────────────────────────────────────────────────

    /// Runs a raw client instruction.
    ///
    /// The instruction must pass the allow-list and parse into a known
    /// command shape; the bridge receives the canonical rendering.
    pub async fn dispatch_command(&mut self, device_id: Option<String>, instruction: &str) -> ServerEvent {
        match DeviceCommand::parse(instruction) {
            Ok(command) => self.execute(device_id, command).await,
            Err(e) => self.reject(e),
        }
    }

    pub async fn dispatch_text(&mut self, device_id: Option<String>, text: &str) -> ServerEvent {
        self.execute(device_id, DeviceCommand::text(text)).await
    }

    pub async fn dispatch_tap(&mut self, device_id: Option<String>, x: i32, y: i32) -> ServerEvent {
        self.execute(device_id, DeviceCommand::tap(x, y)).await
    }

    /// `duration_ms` defaults to 300 when `None`.
    pub async fn dispatch_swipe(
        &mut self,
        device_id: Option<String>,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: Option<u32>,
    ) -> ServerEvent {
        self.execute(device_id, DeviceCommand::swipe(x1, y1, x2, y2, duration_ms))
            .await
    }

    async fn execute(&mut self, device_id: Option<String>, command: DeviceCommand) -> ServerEvent {
        let instruction = match command.authorize() {
            Ok(instruction) => instruction,
            Err(e) => return self.reject(e),
        };
        let device = self.select(device_id);

        debug!(session = %self.id, command = command.kind(), "dispatching");
        match self.services.bridge.invoke(device.as_deref(), &instruction).await {
            Ok(output) => ServerEvent::command_ok(output),
            Err(e) => {
                warn!(session = %self.id, command = command.kind(), "bridge call failed: {e}");
                ServerEvent::command_err(e.to_string())
            }
        }
    }

    fn reject(&self, error: CommandError) -> ServerEvent {
        match &error {
            CommandError::Unauthorized(instruction) => {
                warn!(session = %self.id, instruction = %instruction, "unauthorized command rejected");
            }
            other => warn!(session = %self.id, "command rejected: {other}"),
        }
        ServerEvent::command_err(error.to_string())
    }

    /// Normalises a client selector; empty means the bridge default.
    fn select(&mut self, device_id: Option<String>) -> Option<String> {
        let device = device_id.filter(|id| !id.is_empty());
        if device.is_some() {
            self.active_device_id.clone_from(&device);
        }
        device
    }

    // ── Device management ─────────────────────────────────────────────────────

    pub async fn list_devices(&self) -> ServerEvent {
        match self.services.bridge.invoke_list().await {
            Ok(devices) => {
                debug!(session = %self.id, count = devices.len(), "devices listed");
                ServerEvent::devices_ok(devices)
            }
            Err(e) => {
                warn!(session = %self.id, "device listing failed: {e}");
                ServerEvent::devices_err(e.to_string())
            }
        }
    }

    /// Connects the bridge to a network device; succeeds only when the
    /// bridge confirms the connection.
    pub async fn connect_device(&mut self, device_id: &str) -> ServerEvent {
        if device_id.is_empty() {
            return ServerEvent::ConnectResponse {
                success: false,
                output: None,
                error: Some(CommandError::MissingParameter("device ID").to_string()),
                device_id: String::new(),
            };
        }

        let (success, output, error) = match self.services.bridge.connect(device_id).await {
            Ok(output) if confirms_connection(&output) => {
                info!(session = %self.id, device = device_id, "device connected");
                self.active_device_id = Some(device_id.to_string());
                (true, Some(output), None)
            }
            Ok(output) => {
                let error = output.trim().to_string();
                warn!(session = %self.id, device = device_id, "connect not confirmed: {error}");
                (false, Some(output), Some(error))
            }
            Err(e) => {
                warn!(session = %self.id, device = device_id, "connect failed: {e}");
                (false, None, Some(e.to_string()))
            }
        };

        ServerEvent::ConnectResponse {
            success,
            output,
            error,
            device_id: device_id.to_string(),
        }
    }

    pub async fn disconnect_device(&mut self, device_id: &str) -> ServerEvent {
        if device_id.is_empty() {
            return ServerEvent::DisconnectResponse {
                success: false,
                output: None,
                error: Some(CommandError::MissingParameter("device ID").to_string()),
                device_id: String::new(),
            };
        }

        match self.services.bridge.disconnect(device_id).await {
            Ok(output) => {
                info!(session = %self.id, device = device_id, "device disconnected");
                if self.active_device_id.as_deref() == Some(device_id) {
                    self.active_device_id = None;
                }
                ServerEvent::DisconnectResponse {
                    success: true,
                    output: Some(output),
                    error: None,
                    device_id: device_id.to_string(),
                }
            }
            Err(e) => {
                warn!(session = %self.id, device = device_id, "disconnect failed: {e}");
                ServerEvent::DisconnectResponse {
                    success: false,
                    output: None,
                    error: Some(e.to_string()),
                    device_id: device_id.to_string(),
                }
            }
        }
    }

    // ── Screen capture ────────────────────────────────────────────────────────

    /// Starts streaming frames, replacing any running capture.
    pub fn start_capture(&mut self, device_id: Option<String>) {
        if let Some(previous) = self.capture.take() {
            previous.cancel();
            debug!(session = %self.id, "previous capture cancelled");
        }

        let device = self.select(device_id);
        info!(session = %self.id, device = device.as_deref().unwrap_or("default"), "capture started");
        let streamer = ScreenStreamer::new(
            Arc::clone(&self.services.bridge),
            device,
            self.services.frame_interval,
            self.events.clone(),
        );
        self.capture = Some(streamer.spawn());
    }

    /// Stops streaming.  Always acknowledged, even when idle.
    pub fn stop_capture(&mut self) -> ServerEvent {
        if let Some(capture) = self.capture.take() {
            capture.cancel();
            info!(session = %self.id, "capture stopped");
        }
        ServerEvent::ScreenCaptureStopped
    }

    // ── Scanning ──────────────────────────────────────────────────────────────

    /// Starts a scan in the background.  A running scan is left alone.
    pub fn scan_network(&mut self, network_range: Option<String>) {
        self.scans.retain(|scan| !scan.is_finished());
        if !self.scans.is_empty() {
            debug!(session = %self.id, running = self.scans.len(), "scan requested while another is running");
        }

        let scanner = Arc::clone(&self.services.scanner);
        let events = self.events.clone();
        self.scans.push(tokio::spawn(async move {
            // Failures were already reported as a status event.
            let _ = scanner.run(network_range, events).await;
        }));
    }

    // ── Teardown ──────────────────────────────────────────────────────────────

    /// Cancels everything the session owns.  Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.cancel();
        }
        for scan in self.scans.drain(..) {
            scan.abort();
        }
        debug!(session = %self.id, "session torn down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
