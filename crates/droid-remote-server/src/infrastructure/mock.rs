//! In-memory doubles for the application seams.
//!
//! Lets sessions, the streamer and the scanner run in tests without an `adb`
//! binary, a device, or a network.

use std::collections::{HashSet, VecDeque};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use droid_remote_core::DeviceRecord;

use crate::application::bridge::{BridgeError, DeviceBridge};
use crate::application::scanner::{InterfaceSource, PortProber};

// ── MockBridge ────────────────────────────────────────────────────────────────

/// One recorded call on [`MockBridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    Invoke {
        device_id: Option<String>,
        instruction: String,
    },
    List,
    Connect(String),
    Disconnect(String),
    CaptureFrame {
        device_id: Option<String>,
        instruction: String,
    },
}

/// A scripted [`DeviceBridge`] that records every call.
///
/// Defaults: `invoke` and `disconnect` succeed with empty output, the device
/// list is empty, `connect` is confirmed only for targets registered with
/// [`MockBridge::with_connectable`], and each capture returns a distinct
/// frame (`"frame-1"`, `"frame-2"`, ...).
pub struct MockBridge {
    calls: Mutex<Vec<BridgeCall>>,
    invoke_result: Result<String, BridgeError>,
    devices: Result<Vec<DeviceRecord>, BridgeError>,
    connectable: HashSet<String>,
    capture_results: Mutex<VecDeque<Result<String, BridgeError>>>,
    capture_delay: Duration,
    captures: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBridge {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            invoke_result: Ok(String::new()),
            devices: Ok(Vec::new()),
            connectable: HashSet::new(),
            capture_results: Mutex::new(VecDeque::new()),
            capture_delay: Duration::ZERO,
            captures: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every `invoke` returns `result`.
    pub fn with_invoke_result(mut self, result: Result<String, BridgeError>) -> Self {
        self.invoke_result = result;
        self
    }

    pub fn with_invoke_output(self, output: &str) -> Self {
        self.with_invoke_result(Ok(output.to_string()))
    }

    pub fn with_devices(mut self, devices: Result<Vec<DeviceRecord>, BridgeError>) -> Self {
        self.devices = devices;
        self
    }

    /// `connect` confirms these targets and refuses all others.
    pub fn with_connectable<'a>(mut self, targets: impl IntoIterator<Item = &'a str>) -> Self {
        self.connectable = targets.into_iter().map(str::to_string).collect();
        self
    }

    /// Each capture takes `delay` before returning.
    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }

    /// Queues the result of the next capture not yet scripted.
    pub fn push_capture_result(&self, result: Result<String, BridgeError>) {
        self.capture_results
            .lock()
            .expect("lock poisoned")
            .push_back(result);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<BridgeCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Instructions passed to `invoke`, in order.
    pub fn invoked_instructions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BridgeCall::Invoke { instruction, .. } => Some(instruction),
                _ => None,
            })
            .collect()
    }

    /// Number of `capture_frame` calls started.
    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Highest number of captures observed in flight at once.
    pub fn max_concurrent_captures(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: BridgeCall) {
        self.calls.lock().expect("lock poisoned").push(call);
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even if the capture future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceBridge for MockBridge {
    async fn invoke(&self, device_id: Option<&str>, instruction: &str) -> Result<String, BridgeError> {
        self.record(BridgeCall::Invoke {
            device_id: device_id.map(str::to_string),
            instruction: instruction.to_string(),
        });
        self.invoke_result.clone()
    }

    async fn invoke_list(&self) -> Result<Vec<DeviceRecord>, BridgeError> {
        self.record(BridgeCall::List);
        self.devices.clone()
    }

    async fn connect(&self, target: &str) -> Result<String, BridgeError> {
        self.record(BridgeCall::Connect(target.to_string()));
        if self.connectable.contains(target) {
            Ok(format!("connected to {target}\n"))
        } else {
            Ok(format!("failed to connect to '{target}': Connection refused\n"))
        }
    }

    async fn disconnect(&self, device_id: &str) -> Result<String, BridgeError> {
        self.record(BridgeCall::Disconnect(device_id.to_string()));
        Ok(format!("disconnected {device_id}\n"))
    }

    async fn capture_frame(&self, device_id: Option<&str>, instruction: &str) -> Result<String, BridgeError> {
        self.record(BridgeCall::CaptureFrame {
            device_id: device_id.map(str::to_string),
            instruction: instruction.to_string(),
        });
        let n = self.captures.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.capture_delay.is_zero() {
            tokio::time::sleep(self.capture_delay).await;
        }

        let scripted = self.capture_results.lock().expect("lock poisoned").pop_front();
        scripted.unwrap_or_else(|| Ok(format!("frame-{n}")))
    }
}

// ── MockProber ────────────────────────────────────────────────────────────────

/// A [`PortProber`] with a fixed set of open targets.
#[derive(Debug, Default)]
pub struct MockProber {
    open: HashSet<SocketAddrV4>,
    stagger: Duration,
    probes: AtomicUsize,
}

impl MockProber {
    /// Every port is closed.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open(open: impl IntoIterator<Item = SocketAddrV4>) -> Self {
        Self {
            open: open.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Each probe resolves after `step` × the host's last octet, so results
    /// arrive spread out over time.
    pub fn with_staggered_delay(mut self, step: Duration) -> Self {
        self.stagger = step;
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortProber for MockProber {
    async fn probe(&self, target: SocketAddrV4, _timeout: Duration) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if !self.stagger.is_zero() {
            let octet = u32::from(target.ip().octets()[3]);
            tokio::time::sleep(self.stagger * octet).await;
        }
        self.open.contains(&target)
    }
}

// ── StaticInterfaces ──────────────────────────────────────────────────────────

/// An [`InterfaceSource`] with a fixed address list.
///
/// Addresses are returned as given, loopback included, so tests can check
/// that callers filter them.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces {
    addresses: Vec<Ipv4Addr>,
}

impl StaticInterfaces {
    pub fn new(addresses: Vec<Ipv4Addr>) -> Self {
        Self { addresses }
    }
}

impl InterfaceSource for StaticInterfaces {
    fn ipv4_addresses(&self) -> Vec<Ipv4Addr> {
        self.addresses.clone()
    }
}
