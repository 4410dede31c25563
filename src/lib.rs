//! Packet relay agent.
//!
//! Captures frames from a network interface, keeps those carrying an IP
//! layer, and forwards a `{src, dst, len}` JSON summary of each to a
//! WebSocket endpoint.

pub mod capture;
pub mod config;
pub mod domain;
pub mod error;
pub mod parser;
pub mod relay;
pub mod sink;

pub use capture::{PacketCapture, PacketIter, PnetCapture, RawPacket};
pub use config::Config;
pub use domain::PacketRecord;
pub use error::{CaptureError, ConfigError, RelayError, SinkError};
pub use parser::IpExtractor;
pub use relay::{Relay, RelayStats};
pub use sink::{ConnectionMode, ConsoleSink, RecordSink, WebSocketSink};
