//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Line protocol
// =============================================================================

/// Default line buffer capacity (bytes, terminator excluded)
pub const DEFAULT_LINE_CAPACITY: usize = 128;

/// Upper bound accepted for `protocol.line_capacity`
pub const MAX_LINE_CAPACITY: usize = 4096;

/// Number of fields in a telemetry record
pub const TELEMETRY_FIELDS: usize = 6;

/// Default heartbeat period (milliseconds, 0 disables)
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1000;

// =============================================================================
// CAN
// =============================================================================

/// Identifier of the first telemetry frame
pub const CAN_ID_BASE: u16 = 0x501;

/// Largest classic CAN data payload
pub const CAN_MAX_DATA_LEN: usize = 8;

/// Highest 11-bit standard identifier
pub const CAN_MAX_STANDARD_ID: u16 = 0x7FF;

/// Default SocketCAN interface
pub const DEFAULT_CAN_INTERFACE: &str = "can0";

// =============================================================================
// Network
// =============================================================================

/// Default UDP port for the upstream line protocol
pub const DEFAULT_UDP_PORT: u16 = 9100;

/// Default WebSocket port for browser clients
pub const DEFAULT_WEBSOCKET_PORT: u16 = 9101;

// =============================================================================
// Serial
// =============================================================================

/// Default UART baud rate of the upstream hop
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Consecutive zero-byte reads before assuming port disconnected
pub const SERIAL_DISCONNECT_THRESHOLD: u32 = 10;

// =============================================================================
// Timing - Reconnection
// =============================================================================

/// Delay between serial reconnection attempts (milliseconds)
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;

/// Consecutive failed serial opens before giving up (0 = never)
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 0;

/// Period of the shutdown flag check in every loop (milliseconds)
pub const SHUTDOWN_POLL_MS: u64 = 100;

// =============================================================================
// Retry
// =============================================================================

/// Maximum socket bind retry attempts
pub const MAX_SOCKET_RETRY_ATTEMPTS: u32 = 5;

/// Base delay between retry attempts (milliseconds)
pub const RETRY_BASE_DELAY_MS: u64 = 200;

// =============================================================================
// Buffers
// =============================================================================

/// Transport read buffer size
pub const READ_BUFFER_SIZE: usize = 4096;

/// Channel capacity for async message passing
pub const CHANNEL_CAPACITY: usize = 256;
