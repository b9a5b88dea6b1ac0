//! Transport abstraction for byte-level I/O
//!
//! Separates I/O concerns from protocol logic:
//! - **Transport**: How bytes flow (Serial, UDP, WebSocket)
//! - **Session**: What the bytes mean (line protocol, CAN packetization)
//!
//! Each transport manages its own execution model internally:
//! - Serial: blocking threads for low latency
//! - UDP/WebSocket: async tokio tasks
//!
//! # Adding a new transport
//!
//! 1. Create `transport/my_transport.rs`
//! 2. Implement the `Transport` trait
//! 3. Add `pub mod my_transport;` here
//! 4. Add a variant to `config::UpstreamTransport` and a branch in the runner

pub mod link;
pub mod serial;
pub mod udp;
pub mod websocket;

pub use link::{link_channel, LinkNotifier, LinkState, LinkStatus};
pub use serial::SerialTransport;
pub use udp::UdpTransport;
pub use websocket::WebSocketTransport;

use bytes::Bytes;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;

/// Channels for bidirectional communication with a transport
///
/// The transport owns the underlying I/O (socket, serial port, etc.)
/// and communicates via these channels. When the transport stops
/// (shutdown or error), it closes the channels.
pub struct TransportChannels {
    /// Receive raw bytes from the transport
    ///
    /// Returns `None` when the transport has stopped.
    pub rx: mpsc::Receiver<Bytes>,

    /// Send raw bytes to the transport
    pub tx: mpsc::Sender<Bytes>,

    /// Whether a peer is currently attached and able to receive replies
    pub link: LinkState,
}

/// Trait for spawnable transports
///
/// A transport does NOT handle:
/// - Line assembly or parsing (that's the session's job)
/// - Statistics or logging of records (that's the session's job)
/// - Reconnection logic (that's the runner's job)
///
/// # Lifecycle
///
/// 1. Create transport with configuration
/// 2. Call `spawn()` to start I/O in background
/// 3. Use returned channels for communication
/// 4. Transport runs until `shutdown` is set or a fatal error occurs
/// 5. Transport closes channels and drops its link notifier when stopping
pub trait Transport: Send + 'static {
    /// Spawn the transport in background
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be initialized
    /// (e.g., port not found, bind failed).
    fn spawn(self, shutdown: Arc<AtomicBool>) -> Result<TransportChannels>;
}
