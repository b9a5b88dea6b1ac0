//! Bridge layer
//!
//! Ties an upstream transport to a CAN bus: the session turns lines into
//! frames and replies, the runner owns transport lifecycle and reconnection.

pub mod runner;
pub mod session;
pub mod stats;

pub use runner::run;
pub use session::{BridgeSession, SessionOptions};
pub use stats::{Stats, StatsSnapshot};
