//! Packet summary record.

use std::net::IpAddr;

use serde::Serialize;

/// Summary of one captured IP packet, as sent on the wire.
///
/// Serializes to `{"src": "...", "dst": "...", "len": N}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketRecord {
    /// Source address of the IP layer
    pub src: String,
    /// Destination address of the IP layer
    pub dst: String,
    /// Total captured length of the packet in bytes
    pub len: usize,
}

impl PacketRecord {
    /// Create a record from the IP layer addresses and the frame length.
    pub fn new(src: IpAddr, dst: IpAddr, len: usize) -> Self {
        Self {
            src: src.to_string(),
            dst: dst.to_string(),
            len,
        }
    }

    /// Encode the record as a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
