//! IMU telemetry to CAN bridge
//!
//! Receives newline-terminated telemetry records (`alpha,beta,gamma,ax,ay,az`)
//! from an upstream hop, packs each record into CAN frames 0x501.. and
//! answers every line with a short status word.
//!
//! ```text
//! Phone/Browser ──► MCU ──UART/USB──► imu-bridge ──SocketCAN──► CAN bus
//! ```

pub mod bridge;
pub mod can;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod transport;

pub use error::{BridgeError, Result};
