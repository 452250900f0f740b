//! Session scenarios driven through the public API against a scripted bridge.

use std::sync::Arc;
use std::time::Duration;

use droid_remote_server::application::{DeviceBridge, NetworkScanner, Services, Session, SessionState};
use droid_remote_server::domain::{ClientRequest, ServerEvent};
use droid_remote_server::infrastructure::mock::{BridgeCall, MockBridge, MockProber, StaticInterfaces};
use tokio::sync::mpsc;
use tokio::time::sleep;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

fn session_with(bridge: Arc<MockBridge>, buffer: usize) -> (Session, mpsc::Receiver<ServerEvent>) {
    let scanner = NetworkScanner::new(
        Arc::clone(&bridge) as Arc<dyn DeviceBridge>,
        Arc::new(MockProber::new()),
        Arc::new(StaticInterfaces::new(vec![])),
        vec![5555],
        Duration::from_secs(1),
    );
    let services = Services {
        bridge,
        scanner: Arc::new(scanner),
        frame_interval: FRAME_INTERVAL,
    };
    let (tx, rx) = mpsc::channel(buffer);
    (Session::new(services, tx), rx)
}

fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Command dispatch ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_command_never_reaches_bridge() {
    // Arrange
    let bridge = Arc::new(MockBridge::new());
    let (mut session, mut rx) = session_with(Arc::clone(&bridge), 16);

    // Act
    session
        .handle(ClientRequest::SendCommand {
            device_id: Some("D1".to_string()),
            command: "rm -rf /".to_string(),
        })
        .await;

    // Assert
    assert_eq!(
        rx.recv().await,
        Some(ServerEvent::command_err("Unauthorized command"))
    );
    assert!(bridge.calls().is_empty());
}

#[tokio::test]
async fn test_swipe_without_duration_uses_300ms() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, mut rx) = session_with(Arc::clone(&bridge), 16);

    session
        .handle(ClientRequest::SendSwipe {
            device_id: Some("D1".to_string()),
            x1: 100,
            y1: 100,
            x2: 150,
            y2: 80,
            duration: None,
        })
        .await;

    assert!(matches!(
        rx.recv().await,
        Some(ServerEvent::CommandResponse { success: true, .. })
    ));
    assert_eq!(
        bridge.calls(),
        vec![BridgeCall::Invoke {
            device_id: Some("D1".to_string()),
            instruction: "input touchscreen swipe 100 100 150 80 300".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_single_space_is_sent_as_key_event() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, _rx) = session_with(Arc::clone(&bridge), 16);

    session
        .handle(ClientRequest::SendText {
            device_id: None,
            text: " ".to_string(),
        })
        .await;

    assert_eq!(
        bridge.invoked_instructions(),
        vec!["input keyevent KEYCODE_SPACE".to_string()]
    );
}

#[tokio::test]
async fn test_text_with_quotes_is_escaped_inside_one_word() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, _rx) = session_with(Arc::clone(&bridge), 16);

    session
        .handle(ClientRequest::SendText {
            device_id: None,
            text: r#"a "b" `c`"#.to_string(),
        })
        .await;

    assert_eq!(
        bridge.invoked_instructions(),
        vec![r#"input text "a \"b\" \`c\`""#.to_string()]
    );
}

#[tokio::test]
async fn test_tap_coordinates_are_not_range_checked() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, _rx) = session_with(Arc::clone(&bridge), 16);

    session
        .handle(ClientRequest::SendTap {
            device_id: None,
            x: -5,
            y: 100_000,
        })
        .await;

    assert_eq!(
        bridge.invoked_instructions(),
        vec!["input touchscreen tap -5 100000".to_string()]
    );
}

#[tokio::test]
async fn test_failures_leave_session_usable() {
    // Arrange: an unauthorized command, then a valid one
    let bridge = Arc::new(MockBridge::new().with_invoke_output("done"));
    let (mut session, mut rx) = session_with(Arc::clone(&bridge), 16);

    // Act
    session
        .handle(ClientRequest::SendCommand {
            device_id: None,
            command: "reboot".to_string(),
        })
        .await;
    session
        .handle(ClientRequest::SendCommand {
            device_id: None,
            command: "input keyevent KEYCODE_BACK".to_string(),
        })
        .await;

    // Assert
    assert_eq!(rx.recv().await, Some(ServerEvent::command_err("Unauthorized command")));
    assert_eq!(rx.recv().await, Some(ServerEvent::command_ok("done".to_string())));
    assert_eq!(bridge.calls().len(), 1);
}

// ── Capture ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stop_when_idle_acknowledges_without_frames() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, mut rx) = session_with(Arc::clone(&bridge), 16);

    session.handle(ClientRequest::StopScreenCapture).await;

    assert_eq!(drain(&mut rx), vec![ServerEvent::ScreenCaptureStopped]);
    assert_eq!(bridge.capture_count(), 0);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_replaces_first_stream() {
    // Arrange
    let bridge = Arc::new(MockBridge::new());
    let (mut session, mut rx) = session_with(Arc::clone(&bridge), 64);

    // Act: start on D1, let one frame through, then restart on D2
    session
        .handle(ClientRequest::StartScreenCapture {
            device_id: Some("D1".to_string()),
        })
        .await;
    sleep(Duration::from_millis(1)).await;
    session
        .handle(ClientRequest::StartScreenCapture {
            device_id: Some("D2".to_string()),
        })
        .await;
    sleep(FRAME_INTERVAL * 10).await;

    // Assert: after the first D2 capture, no D1 capture ever happens
    let captures: Vec<Option<String>> = bridge
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BridgeCall::CaptureFrame { device_id, .. } => Some(device_id),
            _ => None,
        })
        .collect();
    let first_d2 = captures
        .iter()
        .position(|d| d.as_deref() == Some("D2"))
        .unwrap();
    assert!(captures[first_d2..].iter().all(|d| d.as_deref() == Some("D2")));
    assert_eq!(first_d2, 1);
    assert_eq!(bridge.max_concurrent_captures(), 1);

    let frames = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::ScreenData { .. }))
        .count();
    assert_eq!(frames, captures.len());
    assert_eq!(session.state(), SessionState::Capturing);
}

#[tokio::test(start_paused = true)]
async fn test_frames_are_paced_at_the_interval() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, mut rx) = session_with(Arc::clone(&bridge), 64);

    session.start_capture(None);
    sleep(FRAME_INTERVAL * 5 + Duration::from_millis(50)).await;
    session.stop_capture();

    // Captures at t = 0, 100, 200, 300, 400, 500 ms.
    assert_eq!(bridge.capture_count(), 6);
    assert_eq!(drain(&mut rx).len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_stops_capture() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, _rx) = session_with(Arc::clone(&bridge), 64);
    session.start_capture(Some("D1".to_string()));
    sleep(FRAME_INTERVAL * 3).await;

    session.teardown();
    let at_teardown = bridge.capture_count();
    sleep(FRAME_INTERVAL * 10).await;

    assert_eq!(bridge.capture_count(), at_teardown);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_session_stops_capture() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, _rx) = session_with(Arc::clone(&bridge), 64);
    session.start_capture(None);
    sleep(FRAME_INTERVAL * 2).await;

    drop(session);
    let at_drop = bridge.capture_count();
    sleep(FRAME_INTERVAL * 10).await;

    assert_eq!(bridge.capture_count(), at_drop);
}

// ── Device management ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_flow_round_trips_device_id() {
    let bridge = Arc::new(MockBridge::new());
    let (mut session, mut rx) = session_with(Arc::clone(&bridge), 16);

    session
        .handle(ClientRequest::DisconnectDevice {
            device_id: "192.168.1.20:5555".to_string(),
        })
        .await;

    match rx.recv().await {
        Some(ServerEvent::DisconnectResponse {
            success,
            device_id,
            error,
            ..
        }) => {
            assert!(success);
            assert_eq!(device_id, "192.168.1.20:5555");
            assert_eq!(error, None);
        }
        other => panic!("expected DisconnectResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_then_dispatch_records_active_device() {
    let bridge = Arc::new(MockBridge::new().with_connectable(["192.168.1.20:5555"]));
    let (mut session, _rx) = session_with(bridge, 16);

    session
        .handle(ClientRequest::ConnectToDevice {
            device_id: "192.168.1.20:5555".to_string(),
        })
        .await;

    assert_eq!(session.active_device_id(), Some("192.168.1.20:5555"));
}
