//! WebSocket transport for browser clients
//!
//! Lets the browser IMU streamer talk to the bridge directly instead of
//! going through the WebUSB dongle. Text and binary messages are both taken
//! as raw protocol bytes; replies go out as text messages.
//!
//! ```text
//! Browser ──WebSocket:9101──► imu-bridge ──SocketCAN──► CAN bus
//! ```
//!
//! One client at a time (last connection wins). The link is connected while
//! a client is attached.

use super::{link_channel, LinkNotifier, Transport, TransportChannels};
use crate::constants::{CHANNEL_CAPACITY, SHUTDOWN_POLL_MS};
use crate::error::{BridgeError, Result};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// WebSocket server transport
pub struct WebSocketTransport {
    port: u16,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport listening on the specified port
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl Transport for WebSocketTransport {
    fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<TransportChannels> {
        let (in_tx, in_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
        let (out_tx, out_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);

        // Bind up front so a busy port is reported to the caller
        let port = self.port;
        let map_err = |e| BridgeError::WebSocketBind { port, source: e };
        let std_listener =
            std::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
                .map_err(map_err)?;
        std_listener.set_nonblocking(true).map_err(map_err)?;
        let listener = TcpListener::from_std(std_listener).map_err(map_err)?;
        info!("WebSocket server listening on ws://0.0.0.0:{}", port);

        let (link_tx, link) = link_channel(false);

        tokio::spawn(run_websocket_server(
            listener,
            in_tx,
            out_rx,
            Arc::new(link_tx),
            shutdown,
        ));

        Ok(TransportChannels {
            rx: in_rx,
            tx: out_tx,
            link,
        })
    }
}

/// Accept clients and forward traffic until shutdown
async fn run_websocket_server(
    listener: TcpListener,
    in_tx: mpsc::Sender<Bytes>,
    mut out_rx: mpsc::Receiver<Bytes>,
    link_tx: Arc<LinkNotifier>,
    shutdown: Arc<AtomicBool>,
) {
    // Shared sender for the currently connected client, tagged with its address
    let client_tx: Arc<RwLock<Option<(SocketAddr, mpsc::Sender<Bytes>)>>> =
        Arc::new(RwLock::new(None));

    // TX forwarder task: forwards outgoing messages to the connected client
    let client_tx_fwd = client_tx.clone();
    let shutdown_fwd = shutdown.clone();
    tokio::spawn(async move {
        while !shutdown_fwd.load(Ordering::Relaxed) {
            match tokio::time::timeout(Duration::from_millis(SHUTDOWN_POLL_MS), out_rx.recv())
                .await
            {
                Ok(Some(data)) => {
                    let sender = client_tx_fwd.read().as_ref().map(|(_, tx)| tx.clone());
                    if let Some(tx) = sender {
                        let _ = tx.send(data).await;
                    }
                }
                Ok(None) => break,
                Err(_) => {}
            }
        }
    });

    while !shutdown.load(Ordering::Relaxed) {
        match tokio::time::timeout(Duration::from_millis(SHUTDOWN_POLL_MS), listener.accept())
            .await
        {
            Ok(Ok((stream, addr))) => {
                info!("WebSocket client connected: {}", addr);

                let (ws_out_tx, ws_out_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
                *client_tx.write() = Some((addr, ws_out_tx));
                link_tx.attach();

                let in_tx = in_tx.clone();
                let shutdown = shutdown.clone();
                let client_ref = client_tx.clone();
                let link_ref = link_tx.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_websocket_client(stream, in_tx, ws_out_rx, shutdown).await
                    {
                        debug!("WebSocket client {} error: {}", addr, e);
                    }
                    info!("WebSocket client disconnected: {}", addr);

                    // Only the active client takes the link down
                    let mut guard = client_ref.write();
                    if guard.as_ref().map(|(a, _)| *a) == Some(addr) {
                        *guard = None;
                        link_ref.set_connected(false);
                    }
                });
            }
            Ok(Err(e)) => {
                warn!("Failed to accept WebSocket connection: {}", e);
            }
            Err(_) => {} // Timeout, check shutdown flag
        }
    }

    link_tx.set_connected(false);
}

/// Handle a single WebSocket client connection
async fn handle_websocket_client(
    stream: TcpStream,
    in_tx: mpsc::Sender<Bytes>,
    mut out_rx: mpsc::Receiver<Bytes>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| BridgeError::WebSocketAccept {
            source: Box::new(e),
        })?;

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    // RX task: WebSocket → Channel
    let shutdown_rx = shutdown.clone();
    let mut rx_handle = tokio::spawn(async move {
        while !shutdown_rx.load(Ordering::Relaxed) {
            match tokio::time::timeout(Duration::from_millis(SHUTDOWN_POLL_MS), ws_stream.next())
                .await
            {
                Ok(Some(Ok(msg))) => {
                    let data = match msg {
                        Message::Binary(data) => data,
                        Message::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
                        Message::Close(_) => break,
                        // Ping/pong handled by tungstenite
                        _ => continue,
                    };
                    if in_tx.send(data).await.is_err() {
                        break;
                    }
                }
                Ok(Some(Err(_))) => break,
                Ok(None) => break,
                Err(_) => {}
            }
        }
    });

    // TX task: Channel → WebSocket
    let shutdown_tx = shutdown;
    let mut tx_handle = tokio::spawn(async move {
        while !shutdown_tx.load(Ordering::Relaxed) {
            match tokio::time::timeout(Duration::from_millis(SHUTDOWN_POLL_MS), out_rx.recv())
                .await
            {
                Ok(Some(data)) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if ws_sink.send(Message::text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {}
            }
        }
        let _ = ws_sink.close().await;
    });

    tokio::select! {
        _ = &mut rx_handle => {}
        _ = &mut tx_handle => {}
    }
    // A replaced client must not keep feeding the shared input
    rx_handle.abort();
    tx_handle.abort();

    Ok(())
}
