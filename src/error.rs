//! Centralized error types for the bridge
//!
//! Setup and transport failures are represented by the `BridgeError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, BridgeError>`.
//!
//! Per-record protocol outcomes (`PackError`, `ParseError`) are not in here:
//! they are answered on the line and never stop the bridge.

use std::fmt;
use std::path::PathBuf;

/// All bridge errors
#[derive(Debug)]
pub enum BridgeError {
    // === Transport ===
    /// Failed to open serial port
    SerialOpen {
        port: String,
        source: std::io::Error,
    },
    /// Failed to bind UDP socket
    UdpBind { port: u16, source: std::io::Error },
    /// Failed to bind WebSocket server
    WebSocketBind { port: u16, source: std::io::Error },
    /// Failed to accept WebSocket connection
    WebSocketAccept {
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },
    /// Serial reconnection gave up
    ReconnectExhausted { attempts: u32 },

    // === CAN ===
    /// Failed to open the CAN interface
    CanOpen {
        interface: String,
        source: std::io::Error,
    },

    // === Config ===
    /// Failed to read a config or preset file
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid TOML for the expected schema
    ConfigParse { path: PathBuf, reason: String },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },

    // === Detection ===
    /// No device found matching configuration
    NoDeviceFound,
    /// Multiple devices found matching configuration
    MultipleDevicesFound { count: usize },

    // === Platform ===
    /// Feature not supported on this platform
    PlatformNotSupported { feature: &'static str },

    // === Runtime ===
    /// Tokio runtime creation failed
    Runtime { source: std::io::Error },
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SerialOpen { source, .. }
            | Self::UdpBind { source, .. }
            | Self::WebSocketBind { source, .. }
            | Self::CanOpen { source, .. }
            | Self::ConfigRead { source, .. }
            | Self::Runtime { source } => Some(source),
            Self::WebSocketAccept { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerialOpen { port, .. } => write!(f, "Cannot open serial port: {}", port),
            Self::UdpBind { port, .. } => write!(f, "Cannot bind UDP port {}", port),
            Self::WebSocketBind { port, .. } => write!(f, "Cannot bind WebSocket port {}", port),
            Self::WebSocketAccept { .. } => write!(f, "Failed to accept WebSocket connection"),
            Self::ReconnectExhausted { attempts } => {
                write!(f, "Serial reconnection abandoned after {} attempts", attempts)
            }
            Self::CanOpen { interface, source } => {
                write!(f, "Cannot open CAN interface {}: {}", interface, source)
            }
            Self::ConfigRead { path, .. } => write!(f, "Cannot read {}", path.display()),
            Self::ConfigParse { path, reason } => {
                write!(f, "Invalid config {}: {}", path.display(), reason)
            }
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            Self::NoDeviceFound => write!(f, "No device found"),
            Self::MultipleDevicesFound { count } => {
                write!(f, "Multiple devices found ({})", count)
            }
            Self::PlatformNotSupported { feature } => {
                write!(f, "{} not supported on this platform", feature)
            }
            Self::Runtime { .. } => write!(f, "Failed to create runtime"),
        }
    }
}

/// Alias for Result with BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;
