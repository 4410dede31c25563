//! IP layer extraction from Ethernet frames.

use std::net::IpAddr;

use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet;

use crate::capture::RawPacket;
use crate::domain::PacketRecord;

/// Length of an 802.1Q tag following the Ethernet header
const VLAN_TAG_LEN: usize = 4;

/// Extracts source/destination addresses from captured frames.
///
/// Only IPv4 is recognised unless IPv6 is enabled. Anything else
/// (ARP, LLDP, truncated headers) yields `None`.
#[derive(Debug, Clone, Default)]
pub struct IpExtractor {
    include_ipv6: bool,
}

impl IpExtractor {
    /// Create an extractor that accepts IPv4 only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure whether IPv6 frames produce records.
    pub fn with_ipv6(mut self, include: bool) -> Self {
        self.include_ipv6 = include;
        self
    }

    /// Build a record for a frame, or `None` if it has no usable IP layer.
    ///
    /// The record length is the full captured frame length.
    pub fn extract(&self, packet: &RawPacket) -> Option<PacketRecord> {
        let (src, dst) = self.ip_addresses(&packet.data)?;
        Some(PacketRecord::new(src, dst, packet.len()))
    }

    fn ip_addresses(&self, data: &[u8]) -> Option<(IpAddr, IpAddr)> {
        let Some(ethernet) = EthernetPacket::new(data) else {
            tracing::trace!("Skipping frame: shorter than an Ethernet header");
            return None;
        };

        let mut ethertype = ethernet.get_ethertype();
        let mut payload = ethernet.payload();

        // Unwrap a single 802.1Q tag
        if ethertype == EtherTypes::Vlan {
            let vlan = VlanPacket::new(payload)?;
            ethertype = vlan.get_ethertype();
            payload = &payload[VLAN_TAG_LEN..];
        }

        match ethertype {
            EtherTypes::Ipv4 => ipv4_addresses(payload),
            EtherTypes::Ipv6 if self.include_ipv6 => ipv6_addresses(payload),
            other => {
                skip(other);
                None
            }
        }
    }
}

/// Any payload long enough for an IPv4 header counts, whatever its
/// version or IHL fields say.
fn ipv4_addresses(payload: &[u8]) -> Option<(IpAddr, IpAddr)> {
    let Some(ipv4) = Ipv4Packet::new(payload) else {
        tracing::trace!("Skipping frame: truncated IPv4 header");
        return None;
    };
    Some((
        IpAddr::V4(ipv4.get_source()),
        IpAddr::V4(ipv4.get_destination()),
    ))
}

fn ipv6_addresses(payload: &[u8]) -> Option<(IpAddr, IpAddr)> {
    let Some(ipv6) = Ipv6Packet::new(payload) else {
        tracing::trace!("Skipping frame: truncated IPv6 header");
        return None;
    };
    Some((
        IpAddr::V6(ipv6.get_source()),
        IpAddr::V6(ipv6.get_destination()),
    ))
}

fn skip(ethertype: EtherType) {
    tracing::trace!("Skipping frame: no IP layer (ethertype {})", ethertype);
}
