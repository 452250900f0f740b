//! Self-pacing screen streaming.
//!
//! A [`ScreenStreamer`] repeatedly asks the bridge for one frame and forwards
//! it to the session's outbound queue.  At most one capture is in flight at a
//! time, and two capture requests never start closer together than the frame
//! interval, even when a single capture takes longer than the interval.
//!
//! # Cancellation
//!
//! The loop is owned through a [`CaptureHandle`].  Every wait point (the
//! pacing guard, the capture itself, the send, and the post-frame sleep)
//! races against a [`CancellationToken`], so once the handle is cancelled or
//! dropped no further capture is started.  The task is also aborted, which
//! drops any in-flight bridge future (and with it the child process).

use std::sync::Arc;
use std::time::Duration;

use droid_remote_core::DeviceCommand;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::application::bridge::DeviceBridge;
use crate::domain::messages::ServerEvent;

// ── Handle ────────────────────────────────────────────────────────────────────

/// Ownership of one running capture loop.
///
/// Dropping the handle cancels the loop.
#[derive(Debug)]
pub struct CaptureHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    /// Stops the loop.  No capture starts after this returns.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns `true` once the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── Streamer ──────────────────────────────────────────────────────────────────

/// Configuration of one capture loop.
pub struct ScreenStreamer {
    bridge: Arc<dyn DeviceBridge>,
    device_id: Option<String>,
    interval: Duration,
    events: mpsc::Sender<ServerEvent>,
}

impl ScreenStreamer {
    pub fn new(
        bridge: Arc<dyn DeviceBridge>,
        device_id: Option<String>,
        interval: Duration,
        events: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            bridge,
            device_id,
            interval,
            events,
        }
    }

    /// Starts the loop on the current tokio runtime.
    pub fn spawn(self) -> CaptureHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(cancel.clone()));
        CaptureHandle { cancel, task }
    }

    async fn run(self, cancel: CancellationToken) {
        let instruction = match DeviceCommand::Screencap.authorize() {
            Ok(instruction) => instruction,
            Err(e) => {
                error!("screencap instruction rejected: {e}");
                return;
            }
        };

        let device = self.device_id.as_deref();
        let mut last_capture: Option<Instant> = None;
        let mut frames: u64 = 0;

        loop {
            // Pacing guard: wait out the rest of the interval if the previous
            // capture started less than one interval ago.
            if let Some(last) = last_capture {
                let elapsed = last.elapsed();
                if elapsed < self.interval {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = sleep(self.interval - elapsed) => {}
                    }
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            last_capture = Some(Instant::now());
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.bridge.capture_frame(device, &instruction) => result,
            };

            match result {
                Ok(data) => {
                    // Awaiting queue space keeps a slow client from piling up
                    // frames; the next tick is not scheduled until this lands.
                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        sent = self.events.send(ServerEvent::ScreenData { data }) => sent,
                    };
                    if sent.is_err() {
                        debug!("outbound queue closed, stopping capture");
                        break;
                    }
                    frames += 1;
                }
                Err(e) => warn!(device = device.unwrap_or("default"), "frame capture failed: {e}"),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }

        debug!(frames, "capture loop exited");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bridge::BridgeError;
    use crate::infrastructure::mock::{BridgeCall, MockBridge};

    const INTERVAL: Duration = Duration::from_millis(100);

    fn streamer(
        bridge: Arc<MockBridge>,
        capacity: usize,
    ) -> (ScreenStreamer, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            ScreenStreamer::new(bridge, Some("D1".to_string()), INTERVAL, tx),
            rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_streamer_emits_frames_paced_by_interval() {
        // Arrange
        let bridge = Arc::new(MockBridge::new());
        let (streamer, mut rx) = streamer(Arc::clone(&bridge), 16);

        // Act
        let handle = streamer.spawn();
        let first = rx.recv().await.unwrap();
        let started = Instant::now();
        let second = rx.recv().await.unwrap();

        // Assert
        assert!(matches!(first, ServerEvent::ScreenData { .. }));
        assert!(matches!(second, ServerEvent::ScreenData { .. }));
        assert!(started.elapsed() >= INTERVAL);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_streamer_captures_with_screencap_instruction() {
        let bridge = Arc::new(MockBridge::new());
        let (streamer, mut rx) = streamer(Arc::clone(&bridge), 16);

        let handle = streamer.spawn();
        rx.recv().await.unwrap();
        handle.cancel();

        assert_eq!(
            bridge.calls()[0],
            BridgeCall::CaptureFrame {
                device_id: Some("D1".to_string()),
                instruction: "screencap -p".to_string(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_capture_does_not_stop_the_loop() {
        // Arrange: first two captures fail, later ones succeed
        let bridge = Arc::new(MockBridge::new());
        bridge.push_capture_result(Err(BridgeError::Failed("device offline".to_string())));
        bridge.push_capture_result(Err(BridgeError::Failed("device offline".to_string())));
        let (streamer, mut rx) = streamer(Arc::clone(&bridge), 16);

        // Act
        let handle = streamer.spawn();
        let frame = rx.recv().await.unwrap();

        // Assert: the third attempt produced the first frame
        assert!(matches!(frame, ServerEvent::ScreenData { .. }));
        assert_eq!(bridge.capture_count(), 3);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_capture_does_not_overlap_or_burst() {
        // Arrange: each capture takes 250 ms, longer than the interval
        let bridge = Arc::new(MockBridge::new().with_capture_delay(Duration::from_millis(250)));
        let (streamer, mut rx) = streamer(Arc::clone(&bridge), 16);

        // Act
        let handle = streamer.spawn();
        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        handle.cancel();

        // Assert: a single request in flight at any time
        assert_eq!(bridge.max_concurrent_captures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_captures() {
        // Arrange
        let bridge = Arc::new(MockBridge::new());
        let (streamer, mut rx) = streamer(Arc::clone(&bridge), 16);
        let handle = streamer.spawn();
        rx.recv().await.unwrap();

        // Act
        handle.cancel();
        let after_cancel = bridge.capture_count();
        sleep(INTERVAL * 10).await;

        // Assert
        assert!(handle.is_cancelled());
        assert_eq!(bridge.capture_count(), after_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels_loop() {
        let bridge = Arc::new(MockBridge::new());
        let (streamer, mut rx) = streamer(Arc::clone(&bridge), 16);
        let handle = streamer.spawn();
        rx.recv().await.unwrap();

        drop(handle);
        let after_drop = bridge.capture_count();
        sleep(INTERVAL * 10).await;

        assert_eq!(bridge.capture_count(), after_drop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_applies_backpressure() {
        // Arrange: a queue of one that nobody drains
        let bridge = Arc::new(MockBridge::new());
        let (streamer, _rx) = streamer(Arc::clone(&bridge), 1);

        // Act
        let handle = streamer.spawn();
        sleep(INTERVAL * 20).await;

        // Assert: one frame queued, one waiting for space, nothing more
        assert_eq!(bridge.capture_count(), 2);
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_queue_ends_loop() {
        let bridge = Arc::new(MockBridge::new());
        let (streamer, rx) = streamer(Arc::clone(&bridge), 4);
        drop(rx);

        let handle = streamer.spawn();
        sleep(INTERVAL * 5).await;

        assert!(handle.is_finished());
        assert_eq!(bridge.capture_count(), 1);
    }
}
