//! Concurrent discovery of network devices.
//!
//! A scan probes every host `.1`..=`.254` of a `/24` on every configured port
//! with a TCP connect attempt.  All probes run concurrently; each resolves to
//! open or closed.  Open targets are verified asynchronously by asking the
//! bridge to connect to them.
//!
//! # Aggregation
//!
//! Probes are spawned into a [`JoinSet`] and the scan task itself is the only
//! consumer of their results.  Each resolution is recorded into a
//! [`ScanTally`] from that single task, so the completed-probe counter needs
//! no locking and completion is observed exactly once.  A probe task that
//! panics or is aborted still counts as one closed probe.
//!
//! # Event order
//!
//! ```text
//! scanStatus "Starting network scan..."
//! scanStatus "Scanning network range: 192.168.1.0/24"
//! scanProgress × totalProbes         (resolution order, not address order)
//! deviceDiscovered × verified        (interleaved with progress)
//! scanStatus "Scan complete. Found N potential devices."
//! scanComplete { devices }           (every open target, verified or not)
//! ```

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use droid_remote_core::{RangeError, ScanRange, ScanTally, HOSTS_PER_RANGE};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::application::bridge::{confirms_connection, DeviceBridge};
use crate::domain::messages::ServerEvent;

// ── Seams ─────────────────────────────────────────────────────────────────────

/// One TCP connect attempt.
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Returns `true` if a connection to `target` was established within
    /// `timeout`.  Timeouts and connection errors are both `false`.  The
    /// socket is closed before returning in every case.
    async fn probe(&self, target: SocketAddrV4, timeout: Duration) -> bool;
}

/// Source of local interface addresses, used to derive the default range.
pub trait InterfaceSource: Send + Sync {
    /// Non-loopback IPv4 addresses, in the platform's enumeration order.
    fn ipv4_addresses(&self) -> Vec<Ipv4Addr>;
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub address: Ipv4Addr,
    pub port: u16,
    pub open: bool,
}

impl ProbeResult {
    /// `ip:port`, the form used as a bridge device id.
    pub fn target(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Reasons a scan ends before probing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// No range was supplied and no usable interface was found.
    #[error("Could not determine network range")]
    NoInterface,

    #[error("Invalid network range: {range}")]
    InvalidRange {
        range: String,
        #[source]
        source: RangeError,
    },
}

// ── Scanner ───────────────────────────────────────────────────────────────────

/// Runs network scans.  One instance is shared by every session.
pub struct NetworkScanner {
    bridge: Arc<dyn DeviceBridge>,
    prober: Arc<dyn PortProber>,
    interfaces: Arc<dyn InterfaceSource>,
    ports: Vec<u16>,
    probe_timeout: Duration,
}

impl NetworkScanner {
    pub fn new(
        bridge: Arc<dyn DeviceBridge>,
        prober: Arc<dyn PortProber>,
        interfaces: Arc<dyn InterfaceSource>,
        ports: Vec<u16>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            bridge,
            prober,
            interfaces,
            ports,
            probe_timeout,
        }
    }

    /// Number of probes one scan issues.
    pub fn total_probes(&self) -> u32 {
        HOSTS_PER_RANGE * self.ports.len() as u32
    }

    /// Picks the range to scan.
    ///
    /// A supplied range is parsed; otherwise the `/24` of the first
    /// non-loopback IPv4 interface is used.
    ///
    /// # Errors
    ///
    /// [`ScanError::InvalidRange`] for an unparseable range,
    /// [`ScanError::NoInterface`] when nothing qualifies.
    pub fn resolve_range(&self, requested: Option<&str>) -> Result<ScanRange, ScanError> {
        match requested.map(str::trim).filter(|r| !r.is_empty()) {
            Some(range) => ScanRange::parse(range).map_err(|source| ScanError::InvalidRange {
                range: range.to_string(),
                source,
            }),
            None => self
                .interfaces
                .ipv4_addresses()
                .into_iter()
                .find(|addr| !addr.is_loopback())
                .map(ScanRange::from_interface)
                .ok_or(ScanError::NoInterface),
        }
    }

    /// Runs one scan to completion, reporting through `events`.
    ///
    /// Returns every open target.  Verification tasks are awaited before
    /// returning, so all `deviceDiscovered` events have been queued by then.
    /// A closed event queue does not stop the scan.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when no range can be resolved; an
    /// `"Error: ..."` status is emitted first.
    pub async fn run(
        &self,
        requested: Option<String>,
        events: mpsc::Sender<ServerEvent>,
    ) -> Result<Vec<String>, ScanError> {
        emit(&events, ServerEvent::scan_status("Starting network scan...")).await;

        let range = match self.resolve_range(requested.as_deref()) {
            Ok(range) => range,
            Err(e) => {
                warn!("scan aborted: {e}");
                emit(&events, ServerEvent::scan_status(format!("Error: {e}"))).await;
                return Err(e);
            }
        };

        info!(%range, ports = ?self.ports, "scan started");
        emit(
            &events,
            ServerEvent::scan_status(format!("Scanning network range: {range}")),
        )
        .await;

        let mut tally = ScanTally::new(self.total_probes());
        let mut probes = JoinSet::new();
        for address in range.hosts() {
            for &port in &self.ports {
                let prober = Arc::clone(&self.prober);
                let timeout = self.probe_timeout;
                probes.spawn(async move {
                    let open = prober.probe(SocketAddrV4::new(address, port), timeout).await;
                    ProbeResult {
                        address,
                        port,
                        open,
                    }
                });
            }
        }

        let mut verifications = JoinSet::new();
        while let Some(joined) = probes.join_next().await {
            let result = match joined {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("probe task failed: {e}");
                    None
                }
            };

            let open = result.filter(|r| r.open);
            if let Some(result) = open {
                debug!(target = %result.target(), "port open");
                verifications.spawn(verify(
                    Arc::clone(&self.bridge),
                    result,
                    events.clone(),
                ));
            }

            let update = tally.record(open.map(|r| r.target()));
            emit(
                &events,
                ServerEvent::ScanProgress {
                    progress: update.progress,
                },
            )
            .await;
            if update.complete {
                break;
            }
        }

        info!(
            %range,
            probed = tally.completed(),
            total = tally.total(),
            found = tally.found().len(),
            "scan complete"
        );
        let found = tally.into_found();
        emit(
            &events,
            ServerEvent::scan_status(format!(
                "Scan complete. Found {} potential devices.",
                found.len()
            )),
        )
        .await;
        emit(
            &events,
            ServerEvent::ScanComplete {
                devices: found.clone(),
            },
        )
        .await;

        while verifications.join_next().await.is_some() {}
        Ok(found)
    }
}

/// Asks the bridge to connect to an open target and reports it on success.
/// Failures are silent.
async fn verify(bridge: Arc<dyn DeviceBridge>, result: ProbeResult, events: mpsc::Sender<ServerEvent>) {
    let target = result.target();
    match bridge.connect(&target).await {
        Ok(output) if confirms_connection(&output) => {
            info!(%target, "device discovered");
            emit(
                &events,
                ServerEvent::DeviceDiscovered {
                    device_id: target,
                    ip: result.address.to_string(),
                    port: result.port,
                },
            )
            .await;
        }
        Ok(output) => debug!(%target, output = output.trim(), "verification not confirmed"),
        Err(e) => debug!(%target, "verification failed: {e}"),
    }
}

async fn emit(events: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    if events.send(event).await.is_err() {
        debug!("scan event dropped, session closed");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{MockBridge, MockProber, StaticInterfaces};

    const PORT: u16 = 5555;

    fn scanner(bridge: MockBridge, prober: MockProber, interfaces: StaticInterfaces) -> NetworkScanner {
        NetworkScanner::new(
            Arc::new(bridge),
            Arc::new(prober),
            Arc::new(interfaces),
            vec![PORT],
            Duration::from_secs(1),
        )
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    // ── Range resolution ──────────────────────────────────────────────────────

    #[test]
    fn test_resolve_uses_first_non_loopback_interface() {
        // Arrange
        let s = scanner(
            MockBridge::new(),
            MockProber::new(),
            StaticInterfaces::new(vec![
                Ipv4Addr::LOCALHOST,
                Ipv4Addr::new(192, 168, 1, 37),
                Ipv4Addr::new(10, 0, 0, 4),
            ]),
        );

        // Act
        let range = s.resolve_range(None).unwrap();

        // Assert
        assert_eq!(range.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_resolve_prefers_supplied_range() {
        let s = scanner(
            MockBridge::new(),
            MockProber::new(),
            StaticInterfaces::new(vec![Ipv4Addr::new(192, 168, 1, 37)]),
        );
        assert_eq!(
            s.resolve_range(Some("10.1.2.0/24")).unwrap().to_string(),
            "10.1.2.0/24"
        );
    }

    #[test]
    fn test_resolve_without_interfaces_fails() {
        let s = scanner(
            MockBridge::new(),
            MockProber::new(),
            StaticInterfaces::new(vec![Ipv4Addr::LOCALHOST]),
        );
        assert_eq!(s.resolve_range(None), Err(ScanError::NoInterface));
    }

    #[test]
    fn test_resolve_rejects_garbage_range() {
        let s = scanner(MockBridge::new(), MockProber::new(), StaticInterfaces::new(vec![]));
        let err = s.resolve_range(Some("not-a-range")).unwrap_err();
        assert!(matches!(err, ScanError::InvalidRange { .. }));
        assert_eq!(err.to_string(), "Invalid network range: not-a-range");
    }

    #[test]
    fn test_total_probes_scales_with_ports() {
        let s = NetworkScanner::new(
            Arc::new(MockBridge::new()),
            Arc::new(MockProber::new()),
            Arc::new(StaticInterfaces::new(vec![])),
            vec![5555, 5556],
            Duration::from_secs(1),
        );
        assert_eq!(s.total_probes(), 508);
    }

    // ── Full scans ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_scan_without_interface_reports_error_status() {
        // Arrange
        let s = scanner(MockBridge::new(), MockProber::new(), StaticInterfaces::new(vec![]));
        let (tx, mut rx) = mpsc::channel(16);

        // Act
        let result = s.run(None, tx).await;

        // Assert
        assert_eq!(result, Err(ScanError::NoInterface));
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerEvent::scan_status("Starting network scan..."),
                ServerEvent::scan_status("Error: Could not determine network range"),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_reports_every_probe_and_completes_once() {
        // Arrange: two open ports, one of which the bridge accepts
        let open_a = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 5), PORT);
        let open_b = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 9), PORT);
        let bridge = MockBridge::new().with_connectable(["10.0.0.5:5555"]);
        let s = scanner(bridge, MockProber::with_open([open_a, open_b]), StaticInterfaces::new(vec![]));
        let (tx, mut rx) = mpsc::channel(1024);

        // Act
        let mut found = s.run(Some("10.0.0.0/24".to_string()), tx).await.unwrap();
        let events = drain(&mut rx);

        // Assert
        found.sort();
        assert_eq!(found, vec!["10.0.0.5:5555", "10.0.0.9:5555"]);

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ServerEvent::ScanProgress { progress } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 254);
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));

        let completes = events
            .iter()
            .filter(|e| matches!(e, ServerEvent::ScanComplete { .. }))
            .count();
        assert_eq!(completes, 1);

        let discovered: Vec<&ServerEvent> = events
            .iter()
            .filter(|e| matches!(e, ServerEvent::DeviceDiscovered { .. }))
            .collect();
        assert_eq!(
            discovered,
            vec![&ServerEvent::DeviceDiscovered {
                device_id: "10.0.0.5:5555".to_string(),
                ip: "10.0.0.5".to_string(),
                port: PORT,
            }]
        );

        assert!(events.contains(&ServerEvent::scan_status(
            "Scan complete. Found 2 potential devices."
        )));
        assert!(events.contains(&ServerEvent::scan_status(
            "Scanning network range: 10.0.0.0/24"
        )));
    }

    #[tokio::test]
    async fn test_invalid_range_ends_scan_with_status() {
        let s = scanner(MockBridge::new(), MockProber::new(), StaticInterfaces::new(vec![]));
        let (tx, mut rx) = mpsc::channel(16);

        let result = s.run(Some("999.0.0.0/24".to_string()), tx).await;

        assert!(result.is_err());
        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&ServerEvent::scan_status(
                "Error: Invalid network range: 999.0.0.0/24"
            ))
        );
        assert!(!events.iter().any(|e| matches!(e, ServerEvent::ScanComplete { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_complete_follows_all_progress_events() {
        // Arrange: probes resolve at staggered times
        let prober = MockProber::new().with_staggered_delay(Duration::from_millis(3));
        let s = scanner(MockBridge::new(), prober, StaticInterfaces::new(vec![Ipv4Addr::new(172, 16, 4, 2)]));
        let (tx, mut rx) = mpsc::channel(1024);

        // Act
        s.run(None, tx).await.unwrap();
        let events = drain(&mut rx);

        // Assert: nothing but the final status and completion after the 254th progress
        let last_progress = events
            .iter()
            .rposition(|e| matches!(e, ServerEvent::ScanProgress { .. }))
            .unwrap();
        assert_eq!(events.len() - last_progress, 3);
        assert_eq!(events.last(), Some(&ServerEvent::ScanComplete { devices: vec![] }));
    }
}
