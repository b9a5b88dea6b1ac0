//! Record → CAN frame transmission
//!
//! Transmission is best-effort and not atomic: every frame of a record is
//! attempted even after a failure, and the aggregate outcome is reported.

use super::bus::CanBus;
use super::layout::FrameLayout;
use crate::bridge::stats::Stats;
use crate::protocol::TelemetryRecord;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Aggregate failure of one packetization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackError {
    /// Bus not initialized; nothing was sent
    TransportNotReady,
    /// `failed` of `total` frames could not be sent
    SendFailed { failed: usize, total: usize },
}

impl std::error::Error for PackError {}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportNotReady => write!(f, "CAN bus not initialized"),
            Self::SendFailed { failed, total } => {
                write!(f, "{} of {} CAN frames failed", failed, total)
            }
        }
    }
}

/// Sends telemetry records on a CAN bus using one layout
pub struct Packetizer<B: CanBus> {
    layout: FrameLayout,
    bus: B,
    stats: Arc<Stats>,
}

impl<B: CanBus> Packetizer<B> {
    pub fn new(layout: FrameLayout, bus: B, stats: Arc<Stats>) -> Self {
        Self { layout, bus, stats }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Transmit one record; returns the number of frames sent
    pub fn pack(&mut self, record: &TelemetryRecord) -> Result<usize, PackError> {
        if !self.bus.ensure_ready() {
            return Err(PackError::TransportNotReady);
        }

        let frames = self.layout.frames(record);
        let total = frames.len();
        let mut failed = 0;

        for frame in &frames {
            match self.bus.send(frame) {
                Ok(()) => {
                    self.stats.add_frame_sent();
                    debug!("CAN {} TX {}", self.bus.name(), frame);
                }
                Err(e) => {
                    failed += 1;
                    self.stats.add_frame_failed();
                    warn!("CAN {} frame 0x{:03X}: {}", self.bus.name(), frame.id(), e);
                }
            }
        }

        if failed > 0 {
            Err(PackError::SendFailed { failed, total })
        } else {
            Ok(total)
        }
    }
}
