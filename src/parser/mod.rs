//! Packet parsing module.
//!
//! Turns captured frames into packet records, dropping frames that do
//! not carry an IP layer.

mod ip_extractor;

pub use ip_extractor::IpExtractor;

#[cfg(test)]
pub(crate) use ip_extractor::tests as test_frames;
