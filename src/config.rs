//! Configuration management
//!
//! Config file is stored next to the executable as `config.toml`
//! (falling back to `config/default.toml`), or given with `--config`.
//! Device presets are stored in `config/devices/*.toml`

use crate::can::FrameLayout;
use crate::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_CAN_INTERFACE, DEFAULT_HEARTBEAT_INTERVAL_MS,
    DEFAULT_LINE_CAPACITY, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY_MS,
    DEFAULT_UDP_PORT, DEFAULT_WEBSOCKET_PORT, MAX_LINE_CAPACITY,
};
use crate::error::{BridgeError, Result};
use crate::protocol::ParseMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

// =============================================================================
// Device Configuration
// =============================================================================

/// USB device detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name for the device
    pub name: String,
    /// USB Vendor ID
    pub vid: u16,
    /// List of accepted USB Product IDs
    pub pid_list: Vec<u16>,
    /// Platform-specific port name hints (optional)
    #[serde(default)]
    pub name_hint: PlatformNameHint,
}

/// Platform-specific port name hints for device detection fallback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformNameHint {
    /// Windows port name pattern (e.g., "COM")
    pub windows: Option<String>,
    /// macOS port name pattern (e.g., "usbmodem")
    pub macos: Option<String>,
    /// Linux port name pattern (e.g., "ttyACM")
    pub linux: Option<String>,
}

impl PlatformNameHint {
    /// Returns the hint for the current platform
    pub fn current(&self) -> Option<&str> {
        #[cfg(windows)]
        {
            self.windows.as_deref()
        }
        #[cfg(target_os = "macos")]
        {
            self.macos.as_deref()
        }
        #[cfg(target_os = "linux")]
        {
            self.linux.as_deref()
        }
        #[cfg(not(any(windows, target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

/// Wrapper for device preset file format
#[derive(Debug, Deserialize)]
struct DevicePresetFile {
    device: DeviceConfig,
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub protocol: ProtocolConfig,
    pub can: CanConfig,
}

/// Transport carrying the line protocol into the bridge
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum UpstreamTransport {
    /// UART / USB-CDC from the previous hop. Auto-reconnects.
    #[default]
    Serial,
    /// UDP datagrams on localhost (desktop simulation)
    Udp,
    /// WebSocket server (browser streamer)
    WebSocket,
}

/// CAN transmit backend
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum CanBackend {
    /// Linux SocketCAN interface
    #[default]
    Socketcan,
    /// Dry run: frames are only traced
    Log,
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Transport for the upstream hop
    pub transport: UpstreamTransport,

    /// Serial port name (empty = auto-detect using device_preset)
    pub serial_port: String,

    /// Device preset name (filename without .toml in config/devices/)
    pub device_preset: Option<String>,

    /// UART baud rate of the upstream hop
    pub baud_rate: u32,

    /// UDP port when transport = udp
    pub udp_port: u16,

    /// WebSocket port when transport = websocket
    pub websocket_port: u16,

    /// Consecutive failed serial opens before giving up (0 = never)
    pub max_reconnect_attempts: u32,

    /// Delay between serial reconnection attempts
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Line buffer capacity in bytes
    pub line_capacity: usize,
    /// Reject malformed records instead of zero-filling them
    pub strict: bool,
    /// HEARTBEAT period (0 disables)
    pub heartbeat_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanConfig {
    pub backend: CanBackend,
    /// SocketCAN interface name
    pub interface: String,
    /// Frame layout expected by the downstream consumer
    pub layout: FrameLayout,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            transport: UpstreamTransport::Serial,
            serial_port: String::new(),
            device_preset: None,
            baud_rate: DEFAULT_BAUD_RATE,
            udp_port: DEFAULT_UDP_PORT,
            websocket_port: DEFAULT_WEBSOCKET_PORT,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            line_capacity: DEFAULT_LINE_CAPACITY,
            strict: false,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            backend: CanBackend::Socketcan,
            interface: DEFAULT_CAN_INTERFACE.to_string(),
            layout: FrameLayout::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn parse_mode(&self) -> ParseMode {
        if self.strict {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        }
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }
}

impl Config {
    /// Reject values the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        let cap = self.protocol.line_capacity;
        if cap == 0 || cap > MAX_LINE_CAPACITY {
            return Err(BridgeError::ConfigValidation {
                field: "protocol.line_capacity",
                reason: format!("{} is outside 1..={}", cap, MAX_LINE_CAPACITY),
            });
        }
        if self.bridge.baud_rate == 0 {
            return Err(BridgeError::ConfigValidation {
                field: "bridge.baud_rate",
                reason: "must be greater than 0".into(),
            });
        }
        if self.can.backend == CanBackend::Socketcan && self.can.interface.trim().is_empty() {
            return Err(BridgeError::ConfigValidation {
                field: "can.interface",
                reason: "required for the socketcan backend".into(),
            });
        }
        Ok(())
    }
}

/// Get the project root directory
///
/// Searches in order:
/// 1. Next to executable (production deployment)
/// 2. Up from target/release or target/debug (dev builds)
fn find_project_root() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| BridgeError::ConfigRead {
        path: PathBuf::from("executable"),
        source: e,
    })?;
    let exe_dir = exe.parent().ok_or_else(|| BridgeError::ConfigValidation {
        field: "exe_path",
        reason: "no parent directory".into(),
    })?;

    if exe_dir.join("config.toml").exists() || exe_dir.join("config").exists() {
        return Ok(exe_dir.to_path_buf());
    }

    // exe_dir = .../target/release, we want the crate root
    if let Some(target_dir) = exe_dir.parent() {
        if target_dir
            .file_name()
            .map(|n| n == "target")
            .unwrap_or(false)
        {
            if let Some(project_root) = target_dir.parent() {
                if project_root.join("config").exists() {
                    return Ok(project_root.to_path_buf());
                }
            }
        }
    }

    Ok(exe_dir.to_path_buf())
}

/// Get the default config file path
///
/// Looks for config.toml, falls back to config/default.toml
pub fn config_path() -> Result<PathBuf> {
    let root = find_project_root()?;

    let user_config = root.join("config.toml");
    if user_config.exists() {
        return Ok(user_config);
    }

    let default_config = root.join("config").join("default.toml");
    if default_config.exists() {
        return Ok(default_config);
    }

    Ok(user_config)
}

/// Get the devices directory path (config/devices/)
pub fn devices_dir() -> Result<PathBuf> {
    let root = find_project_root()?;
    Ok(root.join("config").join("devices"))
}

/// Load a device preset by name
pub fn load_device_preset(name: &str) -> Result<DeviceConfig> {
    let path = devices_dir()?.join(format!("{}.toml", name));

    let content = fs::read_to_string(&path).map_err(|e| BridgeError::ConfigRead {
        path: path.clone(),
        source: e,
    })?;

    parse_device_preset(&content).map_err(|reason| BridgeError::ConfigValidation {
        field: "device_preset",
        reason: format!("invalid preset '{}': {}", name, reason),
    })
}

fn parse_device_preset(content: &str) -> std::result::Result<DeviceConfig, String> {
    toml::from_str::<DevicePresetFile>(content)
        .map(|w| w.device)
        .map_err(|e| e.to_string())
}

/// Parse a config file
pub fn load_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| BridgeError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| BridgeError::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load the config
///
/// An explicit path must exist and parse. The default location falls back
/// to built-in defaults when missing or broken.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return load_from(path);
    }

    let path = match config_path() {
        Ok(p) => p,
        Err(e) => {
            warn!("Failed to determine config path: {}, using defaults", e);
            return Ok(Config::default());
        }
    };

    if !path.exists() {
        return Ok(Config::default());
    }

    match load_from(&path) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!("{}, using defaults", e);
            Ok(Config::default())
        }
    }
}

/// Detect serial port from config (explicit port or auto-detection via device preset)
pub fn detect_serial(cfg: &BridgeConfig, preset: Option<&DeviceConfig>) -> Result<String> {
    use crate::transport::SerialTransport;

    if !cfg.serial_port.is_empty() {
        return Ok(cfg.serial_port.clone());
    }

    match preset {
        Some(device) => SerialTransport::detect(device),
        None => Err(BridgeError::ConfigValidation {
            field: "bridge.serial_port",
            reason: "empty and no device_preset configured".into(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Default values tests
    // =========================================================================

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.bridge.transport, UpstreamTransport::Serial);
        assert_eq!(config.bridge.serial_port, "");
        assert_eq!(config.bridge.baud_rate, 115_200);
        assert_eq!(config.bridge.max_reconnect_attempts, 0);

        assert_eq!(config.protocol.line_capacity, 128);
        assert!(!config.protocol.strict);
        assert_eq!(config.protocol.heartbeat_interval_ms, 1000);

        assert_eq!(config.can.backend, CanBackend::Socketcan);
        assert_eq!(config.can.interface, "can0");
        assert_eq!(config.can.layout, FrameLayout::FourFrame);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_heartbeat_zero_disables() {
        let protocol = ProtocolConfig {
            heartbeat_interval_ms: 0,
            ..ProtocolConfig::default()
        };
        assert_eq!(protocol.heartbeat_interval(), None);
        assert_eq!(
            ProtocolConfig::default().heartbeat_interval(),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn test_parse_mode_follows_strict_flag() {
        let mut protocol = ProtocolConfig::default();
        assert_eq!(protocol.parse_mode(), ParseMode::Lenient);
        protocol.strict = true;
        assert_eq!(protocol.parse_mode(), ParseMode::Strict);
    }

    // =========================================================================
    // TOML tests
    // =========================================================================

    #[test]
    fn test_transport_toml_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            transport: UpstreamTransport,
        }

        let serial: Wrapper = toml::from_str("transport = \"serial\"").unwrap();
        let udp: Wrapper = toml::from_str("transport = \"udp\"").unwrap();
        let ws: Wrapper = toml::from_str("transport = \"websocket\"").unwrap();

        assert_eq!(serial.transport, UpstreamTransport::Serial);
        assert_eq!(udp.transport, UpstreamTransport::Udp);
        assert_eq!(ws.transport, UpstreamTransport::WebSocket);
    }

    #[test]
    fn test_config_partial_sections() {
        let partial_toml = r#"
[bridge]
transport = "udp"
udp_port = 9500

[can]
backend = "log"
layout = "three_frame"
"#;

        let config: Config = toml::from_str(partial_toml).unwrap();

        assert_eq!(config.bridge.transport, UpstreamTransport::Udp);
        assert_eq!(config.bridge.udp_port, 9500);
        assert_eq!(config.can.backend, CanBackend::Log);
        assert_eq!(config.can.layout, FrameLayout::ThreeFrame);
        // Rest should be defaults
        assert_eq!(config.bridge.serial_port, "");
        assert_eq!(config.can.interface, "can0");
        assert_eq!(config.protocol.line_capacity, 128);
    }

    #[test]
    fn test_config_empty_file() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.bridge.transport, UpstreamTransport::Serial);
        assert_eq!(config.can.layout, FrameLayout::FourFrame);
        assert_eq!(config.protocol.heartbeat_interval_ms, 1000);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.bridge.transport = UpstreamTransport::WebSocket;
        config.bridge.device_preset = Some("xiao-esp32c3".into());
        config.protocol.strict = true;
        config.can.layout = FrameLayout::ThreeFrame;

        let text = toml::to_string_pretty(&config).unwrap();
        let restored: Config = toml::from_str(&text).unwrap();

        assert_eq!(restored.bridge.transport, UpstreamTransport::WebSocket);
        assert_eq!(restored.bridge.device_preset.as_deref(), Some("xiao-esp32c3"));
        assert!(restored.protocol.strict);
        assert_eq!(restored.can.layout, FrameLayout::ThreeFrame);
    }

    #[test]
    fn test_unknown_layout_is_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[can]\nlayout = \"two_frame\"");
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn test_validate_line_capacity() {
        let mut config = Config::default();
        config.protocol.line_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(BridgeError::ConfigValidation {
                field: "protocol.line_capacity",
                ..
            })
        ));

        config.protocol.line_capacity = MAX_LINE_CAPACITY + 1;
        assert!(config.validate().is_err());

        config.protocol.line_capacity = 256;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_can_interface() {
        let mut config = Config::default();
        config.can.interface = " ".into();
        assert!(config.validate().is_err());

        // Not needed by the log backend
        config.can.backend = CanBackend::Log;
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // Device presets
    // =========================================================================

    #[test]
    fn test_parse_device_preset() {
        let preset = r#"
[device]
name = "XIAO ESP32-C3"
vid = 0x303A
pid_list = [0x1001]

[device.name_hint]
linux = "ttyACM"
"#;
        let device = parse_device_preset(preset).unwrap();
        assert_eq!(device.vid, 0x303A);
        assert_eq!(device.pid_list, vec![0x1001]);
        assert_eq!(device.name_hint.linux.as_deref(), Some("ttyACM"));
    }

    #[test]
    fn test_detect_serial_prefers_explicit_port() {
        let cfg = BridgeConfig {
            serial_port: "/dev/ttyUSB0".into(),
            ..BridgeConfig::default()
        };
        assert_eq!(detect_serial(&cfg, None).unwrap(), "/dev/ttyUSB0");

        let empty = BridgeConfig::default();
        assert!(detect_serial(&empty, None).is_err());
    }
}
