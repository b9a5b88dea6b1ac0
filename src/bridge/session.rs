//! Bridge session - line protocol to CAN relay
//!
//! The session handles:
//! - Line assembly from raw upstream bytes
//! - Record parsing and control words
//! - CAN packetization and the status reply for each line
//! - Heartbeat and connect notifications
//!
//! The session does NOT handle:
//! - Transport lifecycle (that's the caller's responsibility)
//! - Reconnection logic (handled by the runner)

use super::stats::Stats;
use crate::can::{CanBus, FrameLayout, Packetizer};
use crate::error::Result;
use crate::protocol::{
    ControlWord, LineAssembler, ParseMode, ParsedLine, RecordParser, Response, ResponseWriter,
};
use crate::transport::TransportChannels;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Session settings taken from `[protocol]` and `[can]`
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub line_capacity: usize,
    pub mode: ParseMode,
    pub layout: FrameLayout,
    pub heartbeat: Option<Duration>,
}

/// Bridge session between an upstream transport and a CAN bus
///
/// # Example
///
/// ```ignore
/// let bus = can::open_bus(&config.can)?;
/// let mut session = BridgeSession::new(options, bus, stats);
/// session.run(channels, shutdown).await?;
/// ```
pub struct BridgeSession<B: CanBus> {
    assembler: LineAssembler,
    parser: RecordParser,
    packetizer: Packetizer<B>,
    stats: Arc<Stats>,
    heartbeat: Option<Duration>,
}

impl<B: CanBus> BridgeSession<B> {
    pub fn new(options: SessionOptions, bus: B, stats: Arc<Stats>) -> Self {
        Self {
            assembler: LineAssembler::new(options.line_capacity),
            parser: RecordParser::new(options.mode),
            packetizer: Packetizer::new(options.layout, bus, stats.clone()),
            stats,
            heartbeat: options.heartbeat,
        }
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn packetizer(&self) -> &Packetizer<B> {
        &self.packetizer
    }

    /// Hand the bus back, e.g. to reuse it for the next connection
    pub fn into_bus(self) -> B {
        self.packetizer.into_bus()
    }

    /// Feed raw upstream bytes, reporting one reply per actionable line
    pub fn process_bytes(&mut self, data: &[u8], mut on_response: impl FnMut(Response)) {
        self.stats.add_rx(data.len());

        for &byte in data {
            if let Some(line) = self.assembler.feed(byte) {
                if let Some(response) = self.process_line(&line) {
                    on_response(response);
                }
            }
        }
    }

    /// Handle one complete line
    ///
    /// Returns `None` for lines that take no action (empty input).
    pub fn process_line(&mut self, line: &[u8]) -> Option<Response> {
        self.stats.add_line();
        let text = String::from_utf8_lossy(line);

        match self.parser.parse(&text) {
            Ok(ParsedLine::Empty) => None,
            Ok(ParsedLine::Control(ControlWord::Ping)) => {
                self.stats.add_ping();
                Some(Response::Pong)
            }
            Ok(ParsedLine::Telemetry(record)) => {
                self.stats.add_record();
                let outcome = self.packetizer.pack(&record);
                Some(Response::from_pack(&outcome))
            }
            Err(e) => {
                debug!("Rejected line {:?}: {}", text, e);
                self.stats.add_rejected();
                Some(Response::BadRecord)
            }
        }
    }

    /// Run the session until shutdown or the transport stops
    ///
    /// Returns `Ok(())` on clean shutdown or transport disconnect.
    /// The caller should check the shutdown flag to determine if
    /// reconnection should be attempted.
    pub async fn run(&mut self, channels: TransportChannels, shutdown: Arc<AtomicBool>) -> Result<()> {
        let TransportChannels { mut rx, tx, link } = channels;
        let mut link_events = link.clone();
        let writer = ResponseWriter::new(tx, link, self.stats.clone());

        // Bytes of a previous connection never complete a line of this one
        self.assembler.clear();

        let initial = link_events.status();
        let mut connected = initial.connected;
        let mut generation = initial.generation;
        if connected {
            writer.send(Response::Connected);
        }

        let mut heartbeat = self.heartbeat.map(heartbeat_interval);

        loop {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                biased;

                // Periodic shutdown check (every 100ms)
                _ = tokio::time::sleep(Duration::from_millis(crate::constants::SHUTDOWN_POLL_MS)) => {}

                change = link_events.changed() => {
                    match change {
                        // Every attach gets its own notice, even one that
                        // replaces a peer without the link going down
                        Some(status) if status.connected => {
                            if status.generation != generation {
                                if connected {
                                    info!("Upstream peer replaced");
                                    self.assembler.clear();
                                } else {
                                    info!("Upstream link up");
                                }
                                generation = status.generation;
                                writer.send(Response::Connected);
                            }
                            connected = true;
                        }
                        Some(_) => {
                            if connected {
                                info!("Upstream link down");
                            }
                            connected = false;
                            self.assembler.clear();
                        }
                        // Transport dropped its notifier
                        None => break,
                    }
                }

                _ = tick(&mut heartbeat) => {
                    writer.send(Response::Heartbeat);
                }

                msg = rx.recv() => {
                    match msg {
                        Some(data) => self.process_bytes(&data, |response| {
                            writer.send(response);
                        }),
                        None => {
                            // Channel closed = transport disconnected
                            break;
                        }
                    }
                }
            }
        }

        let pending = self.assembler.pending();
        if pending > 0 {
            warn!("Discarding {} bytes of unterminated input", pending);
            self.assembler.clear();
        }
        info!("Session ended: {}", self.stats.snapshot());

        Ok(())
    }
}

fn heartbeat_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Wait for the next heartbeat tick, forever if disabled
async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
