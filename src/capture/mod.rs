//! Packet capture abstraction.
//!
//! This module defines the `PacketCapture` trait and provides a
//! pnet-based implementation. Tests drive the relay with in-memory
//! captures through the same trait.

mod pnet_capture;

pub use pnet_capture::PnetCapture;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::CaptureError;

/// A raw link-layer frame captured from the wire.
#[derive(Debug, Clone)]
pub struct RawPacket {
    /// The raw frame data, starting at the Ethernet header
    pub data: Vec<u8>,
}

impl RawPacket {
    /// Wrap captured frame bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Total captured length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Frames yielded by a capture source.
pub type PacketIter<'a> = Box<dyn Iterator<Item = Result<RawPacket, CaptureError>> + 'a>;

/// Trait for packet capture implementations.
///
/// The relay depends on this abstraction rather than on pnet, so it can
/// be driven by mock captures or other backends.
pub trait PacketCapture: Send {
    /// Start capturing and return an iterator over every captured frame.
    ///
    /// No filtering happens at this layer. The iterator returns `None`
    /// once the running flag is cleared. A read fault is yielded once as
    /// `Err` and ends the iteration.
    fn capture_packets(&mut self) -> Result<PacketIter<'_>, CaptureError>;

    /// Get the name of the interface being captured.
    fn interface_name(&self) -> &str;

    /// Set the running flag for graceful shutdown.
    fn set_running(&mut self, running: Arc<AtomicBool>);
}
