//! Command-line interface definition using clap
//!
//! Flags override the matching config file values.

use crate::can::FrameLayout;
use crate::config::{CanBackend, Config, UpstreamTransport};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

// =============================================================================
// CLI Definition
// =============================================================================

/// Line-protocol IMU telemetry to CAN bridge
#[derive(Parser, Debug, Default)]
#[command(name = "imu-bridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: config.toml next to the executable)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Upstream transport
    #[arg(long, value_enum)]
    pub transport: Option<UpstreamTransport>,

    /// Serial port to use (overrides config and auto-detection)
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,

    /// UDP port for the udp transport
    #[arg(long, value_name = "PORT")]
    pub udp_port: Option<u16>,

    /// WebSocket port for the websocket transport
    #[arg(long, value_name = "PORT")]
    pub ws_port: Option<u16>,

    /// CAN transmit backend
    #[arg(long, value_enum)]
    pub can_backend: Option<CanBackend>,

    /// SocketCAN interface name
    #[arg(long, value_name = "IFACE")]
    pub can_interface: Option<String>,

    /// CAN frame layout
    #[arg(long, value_enum, global = true)]
    pub layout: Option<FrameLayout>,

    /// Reject malformed records with ERR:BAD_RECORD
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the bridge (default)
    Run,

    /// Print the CAN frame layout
    Layout,

    /// List serial ports
    Ports,

    /// Parse one line and show the resulting frames and reply
    Parse {
        /// Protocol line, e.g. "1.0,2.0,3.0,0.1,0.2,9.81"
        line: String,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(transport) = self.transport {
            config.bridge.transport = transport;
        }
        if let Some(ref port) = self.port {
            config.bridge.serial_port = port.clone();
        }
        if let Some(port) = self.udp_port {
            config.bridge.udp_port = port;
        }
        if let Some(port) = self.ws_port {
            config.bridge.websocket_port = port;
        }
        if let Some(backend) = self.can_backend {
            config.can.backend = backend;
        }
        if let Some(ref iface) = self.can_interface {
            config.can.interface = iface.clone();
        }
        if let Some(layout) = self.layout {
            config.can.layout = layout;
        }
        if self.strict {
            config.protocol.strict = true;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
