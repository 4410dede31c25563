//! Relay loop.
//!
//! Connects a capture source to a record sink: every captured frame with
//! an IP layer becomes one record delivered to the sink (SRP: the relay
//! only sequences, parsing and delivery live elsewhere).

mod forwarder;

pub use forwarder::{Relay, RelayStats};
