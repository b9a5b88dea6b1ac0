//! Status replies sent back to the upstream host
//!
//! Replies are single ASCII words terminated by '\n'. They are written only
//! while the upstream link reports connected; otherwise they are dropped,
//! never queued or retried.

use crate::bridge::stats::Stats;
use crate::can::PackError;
use crate::transport::LinkState;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Outbound protocol words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Every frame of a record was sent
    Ack,
    /// The CAN bus is not initialized
    NoCanInit,
    /// At least one frame of a record failed
    CanSend,
    /// Reply to `ping`
    Pong,
    /// Periodic liveness tick
    Heartbeat,
    /// Upstream link came up
    Connected,
    /// Record rejected in strict mode
    BadRecord,
}

impl Response {
    /// Protocol word without terminator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ack => "ACK",
            Self::NoCanInit => "ERR:NO_CAN_INIT",
            Self::CanSend => "ERR:CAN_SEND",
            Self::Pong => "PONG",
            Self::Heartbeat => "HEARTBEAT",
            Self::Connected => "WEBUSB_CONNECTED_CALLBACK",
            Self::BadRecord => "ERR:BAD_RECORD",
        }
    }

    /// Protocol word with '\n' terminator
    pub fn to_line(&self) -> String {
        format!("{}\n", self.as_str())
    }

    /// Map a packetization outcome to its reply
    pub fn from_pack<T>(outcome: &Result<T, PackError>) -> Self {
        match outcome {
            Ok(_) => Self::Ack,
            Err(PackError::TransportNotReady) => Self::NoCanInit,
            Err(PackError::SendFailed { .. }) => Self::CanSend,
        }
    }
}

/// Writes replies to the upstream transport when the link is up
pub struct ResponseWriter {
    tx: mpsc::Sender<Bytes>,
    link: LinkState,
    stats: Arc<Stats>,
}

impl ResponseWriter {
    pub fn new(tx: mpsc::Sender<Bytes>, link: LinkState, stats: Arc<Stats>) -> Self {
        Self { tx, link, stats }
    }

    /// Send a reply; returns false if it was dropped
    pub fn send(&self, response: Response) -> bool {
        if !self.link.is_connected() {
            trace!(reply = response.as_str(), "Link down, reply dropped");
            self.stats.add_response_dropped();
            return false;
        }

        match self.tx.try_send(Bytes::from(response.to_line())) {
            Ok(()) => {
                self.stats.add_response_sent();
                true
            }
            Err(e) => {
                debug!(reply = response.as_str(), "Reply dropped: {}", e);
                self.stats.add_response_dropped();
                false
            }
        }
    }
}
