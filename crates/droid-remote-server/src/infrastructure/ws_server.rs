//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections from browsers.
//! 3. Upgrading each connection to a WebSocket session.
//! 4. Running each session as two cooperating halves:
//!    - **Reader**: parses JSON frames into [`ClientRequest`]s and hands them
//!      to the [`Session`] one at a time.
//!    - **Writer**: drains the session's bounded event queue and sends each
//!      [`ServerEvent`] as a JSON text frame.
//! 5. Tearing the session down (capture and scans included) when the browser
//!    goes away.
//! 6. Gracefully shutting down when the `running` flag is cleared.
//!
//! Each browser session runs in its own Tokio task, so one slow client never
//! blocks another.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, trace, warn};

use crate::application::{Services, Session};
use crate::domain::config::ServerConfig;
use crate::domain::messages::{ClientRequest, ServerEvent};
use crate::infrastructure::production_services;

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the WebSocket accept loop until `running` is set to `false`.
///
/// Binds `config.bind_addr` and serves every connection with the production
/// collaborators (`adb`, real sockets).
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: ServerConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {}", config.bind_addr))?;

    info!("droid-remote listening on {}", config.bind_addr);

    let services = production_services(&config);
    serve(listener, services, config.event_buffer, running).await
}

/// Accepts connections on an already-bound `listener` until `running` is
/// cleared.
///
/// Every session shares `services`; `event_buffer` bounds each session's
/// outbound queue.
pub async fn serve(
    listener: TcpListener,
    services: Services,
    event_buffer: usize,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short accept timeout lets the loop notice the shutdown flag even
        // when nobody is connecting.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new browser connection from {peer_addr}");
                let services = services.clone();
                tokio::spawn(async move {
                    handle_browser_session(stream, peer_addr, services, event_buffer).await;
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g. out of file descriptors); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }

    Ok(())
}

/// Parses one text frame.
///
/// A frame that is not a known request becomes the `error` event sent back
/// to the browser; the session stays open.
pub fn decode_request(text: &str) -> Result<ClientRequest, ServerEvent> {
    serde_json::from_str(text).map_err(|e| ServerEvent::Error {
        message: format!("invalid request: {e}"),
    })
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Wraps [`run_session`] and logs the outcome.
async fn handle_browser_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    services: Services,
    event_buffer: usize,
) {
    match run_session(raw_stream, peer_addr, services, event_buffer).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of a single browser WebSocket session.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    services: Services,
    event_buffer: usize,
) -> anyhow::Result<()> {
    // ── Step 1: Complete the WebSocket handshake ───────────────────────────────
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (events_tx, mut events_rx) = mpsc::channel::<ServerEvent>(event_buffer.max(1));
    let frame_errors = events_tx.clone();
    let mut session = Session::new(services, events_tx);
    let session_id = session.id();

    info!("session {session_id} established with {peer_addr}");

    // ── Step 2: Writer task ───────────────────────────────────────────────────
    //
    // The only owner of the sink.  Responses, frames and scan events all pass
    // through the bounded queue, so a slow browser stalls producers instead
    // of growing memory.
    let mut writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            trace!("session {session_id}: sending {}", event.kind());
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("session {session_id}: JSON serialization error: {e}");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                debug!("session {session_id}: WebSocket send failed (browser disconnected)");
                break;
            }
        }
    });

    // ── Step 3: Reader loop ───────────────────────────────────────────────────
    loop {
        let ws_msg = tokio::select! {
            _ = &mut writer => {
                debug!("session {session_id}: writer task ended");
                break;
            }
            next = ws_rx.next() => match next {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                    debug!("session {session_id}: browser WebSocket closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!("session {session_id}: browser WebSocket error: {e}");
                    break;
                }
                None => {
                    debug!("session {session_id}: browser stream ended");
                    break;
                }
            },
        };

        match ws_msg {
            WsMessage::Text(text) => match decode_request(&text) {
                Ok(request) => session.handle(request).await,
                Err(event) => {
                    warn!("session {session_id}: invalid JSON from browser");
                    if frame_errors.send(event).await.is_err() {
                        break;
                    }
                }
            },
            WsMessage::Binary(_) => {
                warn!("session {session_id}: unexpected binary WebSocket frame (ignored)");
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {
                debug!("session {session_id}: WebSocket ping/pong");
            }
            WsMessage::Close(_) => {
                debug!("session {session_id}: WebSocket Close frame received");
                break;
            }
            WsMessage::Frame(_) => {}
        }
    }

    // ── Step 4: Teardown ──────────────────────────────────────────────────────
    session.teardown();
    writer.abort();
    info!("session {session_id} torn down");

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
