//! Domain models for packet relaying.
//!
//! These types are independent of the capture backend and the transport.

mod record;

pub use record::PacketRecord;
