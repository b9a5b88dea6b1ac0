//! Telemetry line protocol
//!
//! Inbound (ASCII, '\n'-terminated):
//! - `alpha,beta,gamma,accel_x,accel_y,accel_z` → packetized onto CAN
//! - `ping` → `PONG`
//!
//! Outbound: `ACK`, `ERR:NO_CAN_INIT`, `ERR:CAN_SEND`, `PONG`, `HEARTBEAT`,
//! `WEBUSB_CONNECTED_CALLBACK`, and `ERR:BAD_RECORD` in strict mode.

pub mod line;
pub mod record;
pub mod response;

pub use line::LineAssembler;
pub use record::{ControlWord, ParseError, ParseMode, ParsedLine, RecordParser, TelemetryRecord};
pub use response::{Response, ResponseWriter};
