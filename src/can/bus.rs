//! CAN transmit primitives
//!
//! A `CanBus` sends single frames and reports whether it is initialized.
//! Readiness is asked again before every record, so a bus that failed to
//! come up at startup is picked up as soon as it becomes available.

use super::frame::CanFrame;
use crate::config::{CanBackend, CanConfig};
use crate::error::{BridgeError, Result};
use std::fmt;
use tracing::debug;

/// Failure to transmit one frame
#[derive(Debug)]
pub enum BusError {
    /// The bus is not initialized
    NotReady,
    /// The frame cannot be represented on this bus
    InvalidFrame { id: u16 },
    /// Driver write failed
    Io(std::io::Error),
}

impl std::error::Error for BusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "CAN bus not initialized"),
            Self::InvalidFrame { id } => write!(f, "Invalid CAN frame 0x{:03X}", id),
            Self::Io(e) => write!(f, "CAN write failed: {}", e),
        }
    }
}

/// Exclusive handle to a CAN transmitter
pub trait CanBus: Send {
    /// Short description for logs
    fn name(&self) -> &str;

    /// Check (and if possible establish) the initialized state
    fn ensure_ready(&mut self) -> bool;

    /// Transmit one frame
    fn send(&mut self, frame: &CanFrame) -> std::result::Result<(), BusError>;
}

impl<B: CanBus + ?Sized> CanBus for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ensure_ready(&mut self) -> bool {
        (**self).ensure_ready()
    }

    fn send(&mut self, frame: &CanFrame) -> std::result::Result<(), BusError> {
        (**self).send(frame)
    }
}

/// Dry-run bus: always ready, traces each frame
#[derive(Debug, Default)]
pub struct LogBus {
    sent: u64,
}

impl LogBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames "sent" so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl CanBus for LogBus {
    fn name(&self) -> &str {
        "log"
    }

    fn ensure_ready(&mut self) -> bool {
        true
    }

    fn send(&mut self, frame: &CanFrame) -> std::result::Result<(), BusError> {
        self.sent += 1;
        debug!("CAN TX {}", frame);
        Ok(())
    }
}

/// SocketCAN raw socket on a Linux network interface
#[cfg(target_os = "linux")]
pub struct SocketCanBus {
    interface: String,
    socket: Option<socketcan::CanSocket>,
}

#[cfg(target_os = "linux")]
impl SocketCanBus {
    /// Create the bus and try to open the interface once
    ///
    /// An open failure is logged, not returned: the bus simply reports
    /// not-ready until a later `ensure_ready` succeeds.
    pub fn new(interface: impl Into<String>) -> Self {
        let mut bus = Self {
            interface: interface.into(),
            socket: None,
        };
        if let Err(e) = bus.open() {
            tracing::warn!("{}, records will be refused until it comes up", e);
        }
        bus
    }

    fn open(&mut self) -> Result<()> {
        use socketcan::Socket;

        let map_err = |e: std::io::Error| BridgeError::CanOpen {
            interface: self.interface.clone(),
            source: e,
        };
        let socket = socketcan::CanSocket::open(&self.interface).map_err(map_err)?;
        socket.set_nonblocking(true).map_err(map_err)?;

        tracing::info!("CAN socket opened on {}", self.interface);
        self.socket = Some(socket);
        Ok(())
    }
}

#[cfg(target_os = "linux")]
impl CanBus for SocketCanBus {
    fn name(&self) -> &str {
        &self.interface
    }

    fn ensure_ready(&mut self) -> bool {
        if self.socket.is_none() {
            if let Err(e) = self.open() {
                debug!("{}", e);
            }
        }
        self.socket.is_some()
    }

    fn send(&mut self, frame: &CanFrame) -> std::result::Result<(), BusError> {
        use socketcan::{EmbeddedFrame, Socket, StandardId};

        let socket = self.socket.as_ref().ok_or(BusError::NotReady)?;
        let id = StandardId::new(frame.id()).ok_or(BusError::InvalidFrame { id: frame.id() })?;
        let raw = socketcan::CanFrame::new(id, frame.data())
            .ok_or(BusError::InvalidFrame { id: frame.id() })?;

        // Non-blocking: a full TX queue surfaces as WouldBlock
        socket.write_frame(&raw).map_err(BusError::Io)
    }
}

/// Open the bus selected in configuration
pub fn open_bus(config: &CanConfig) -> Result<Box<dyn CanBus>> {
    match config.backend {
        CanBackend::Log => Ok(Box::new(LogBus::new())),
        #[cfg(target_os = "linux")]
        CanBackend::Socketcan => Ok(Box::new(SocketCanBus::new(&config.interface))),
        #[cfg(not(target_os = "linux"))]
        CanBackend::Socketcan => Err(BridgeError::PlatformNotSupported {
            feature: "SocketCAN",
        }),
    }
}
