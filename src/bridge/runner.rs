//! Bridge runner
//!
//! Builds the CAN bus and the upstream transport from configuration and
//! runs sessions until shutdown. Serial transport reconnects on unplug.

use super::session::{BridgeSession, SessionOptions};
use super::stats::Stats;
use crate::can::{self, CanBus};
use crate::config::{detect_serial, load_device_preset, Config, DeviceConfig, UpstreamTransport};
use crate::error::{BridgeError, Result};
use crate::transport::{SerialTransport, Transport, UdpTransport, WebSocketTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

// =============================================================================
// Main entry point
// =============================================================================

/// Run the bridge with the configured transport and CAN backend
pub async fn run(config: &Config, shutdown: Arc<AtomicBool>, stats: Arc<Stats>) -> Result<()> {
    let bus = can::open_bus(&config.can)?;
    info!("CAN {}, layout {}", bus.name(), config.can.layout);

    let options = SessionOptions {
        line_capacity: config.protocol.line_capacity,
        mode: config.protocol.parse_mode(),
        layout: config.can.layout,
        heartbeat: config.protocol.heartbeat_interval(),
    };

    match config.bridge.transport {
        UpstreamTransport::Serial => run_serial(config, options, bus, shutdown, stats).await,
        UpstreamTransport::Udp => {
            let channels = UdpTransport::new(config.bridge.udp_port).spawn(shutdown.clone())?;
            info!("Bridge started: UDP:{} -> CAN", config.bridge.udp_port);
            run_once(options, bus, channels, shutdown, stats).await
        }
        UpstreamTransport::WebSocket => {
            let channels =
                WebSocketTransport::new(config.bridge.websocket_port).spawn(shutdown.clone())?;
            info!("Bridge started: WS:{} -> CAN", config.bridge.websocket_port);
            run_once(options, bus, channels, shutdown, stats).await
        }
    }
}

/// Single session, no reconnection
async fn run_once<B: CanBus>(
    options: SessionOptions,
    bus: B,
    channels: crate::transport::TransportChannels,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Stats>,
) -> Result<()> {
    let mut session = BridgeSession::new(options, bus, stats);
    session.run(channels, shutdown).await?;
    info!("Bridge stopped");
    Ok(())
}

// =============================================================================
// Serial (with auto-reconnection)
// =============================================================================

/// Run over the serial hop
///
/// Each failed detect/open counts as one attempt; a session that ran resets
/// the count. Gives up after `max_reconnect_attempts` (0 = never).
async fn run_serial<B: CanBus>(
    config: &Config,
    options: SessionOptions,
    mut bus: B,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Stats>,
) -> Result<()> {
    let cfg = &config.bridge;
    let delay = Duration::from_millis(cfg.reconnect_delay_ms);

    // Load device preset if configured
    let device: Option<DeviceConfig> = match cfg.device_preset.as_deref() {
        Some(name) if cfg.serial_port.is_empty() => match load_device_preset(name) {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("{}", e);
                None
            }
        },
        _ => None,
    };

    let mut failures = 0u32;

    while !shutdown.load(Ordering::Relaxed) {
        let opened = detect_serial(cfg, device.as_ref()).and_then(|port| {
            SerialTransport::new(&port, cfg.baud_rate)
                .spawn(shutdown.clone())
                .map(|channels| (port, channels))
        });

        let (port, channels) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                failures += 1;
                if failures == 1 {
                    warn!("{}, retrying every {} ms", e, cfg.reconnect_delay_ms);
                }
                if cfg.max_reconnect_attempts > 0 && failures >= cfg.max_reconnect_attempts {
                    return Err(BridgeError::ReconnectExhausted { attempts: failures });
                }
                sleep_unless_shutdown(delay, &shutdown).await;
                continue;
            }
        };

        failures = 0;
        info!("Connected: Serial:{} -> CAN {}", port, bus.name());

        let mut session = BridgeSession::new(options, bus, stats.clone());
        session.run(channels, shutdown.clone()).await?;
        bus = session.into_bus();

        // Check if this was a clean shutdown
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        info!("Serial {} lost, reconnecting...", port);
        sleep_unless_shutdown(delay, &shutdown).await;
    }

    info!("Bridge stopped");
    Ok(())
}

/// Sleep in short slices so shutdown stays responsive
async fn sleep_unless_shutdown(total: Duration, shutdown: &AtomicBool) {
    let slice = Duration::from_millis(crate::constants::SHUTDOWN_POLL_MS);
    let mut remaining = total;
    while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
        let step = remaining.min(slice);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}
