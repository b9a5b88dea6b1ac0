//! CAN side of the bridge
//!
//! - `frame`: fixed-size data frames carrying packed f32 values
//! - `layout`: record-to-frame mapping variants
//! - `bus`: transmit primitives (SocketCAN, dry-run log)
//! - `packetizer`: best-effort transmission of a record

pub mod bus;
pub mod frame;
pub mod layout;
pub mod packetizer;

pub use bus::{open_bus, BusError, CanBus, LogBus};
pub use frame::CanFrame;
pub use layout::{Field, FrameLayout, FrameSlot};
pub use packetizer::{PackError, Packetizer};

#[cfg(target_os = "linux")]
pub use bus::SocketCanBus;
