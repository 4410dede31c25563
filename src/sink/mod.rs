//! Record sinks.
//!
//! This module defines the `RecordSink` trait and provides a WebSocket
//! sink for forwarding records and a console sink for dry runs.

mod console_sink;
mod websocket_sink;

pub use console_sink::ConsoleSink;
pub use websocket_sink::{ConnectionMode, WebSocketSink};

use crate::domain::PacketRecord;
use crate::error::SinkError;

/// Trait for destinations of packet records.
///
/// This trait only handles delivery, not filtering or transformation.
pub trait RecordSink: Send {
    /// Deliver one record.
    fn send(&mut self, record: &PacketRecord) -> Result<(), SinkError>;

    /// Called when the relay starts.
    fn on_start(&mut self, interface: &str);

    /// Called when the relay stops, on every exit path.
    fn on_stop(&mut self);
}
