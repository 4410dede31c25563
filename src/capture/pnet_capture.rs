//! pnet-based packet capture implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pnet::datalink::{self, Channel, Config, NetworkInterface};

use super::{PacketCapture, PacketIter, RawPacket};
use crate::error::CaptureError;

/// How long a read blocks before the running flag is checked again.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Packet capture using the pnet datalink layer.
pub struct PnetCapture {
    interface: NetworkInterface,
    running: Arc<AtomicBool>,
}

impl PnetCapture {
    /// Create a new capture on the specified interface.
    pub fn new(interface_name: &str) -> Result<Self, CaptureError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == interface_name)
            .ok_or_else(|| CaptureError::InterfaceNotFound(interface_name.to_string()))?;

        Ok(Self::with_interface(interface))
    }

    /// Create a capture on the first suitable interface.
    ///
    /// Looks for an interface that is up, not a loopback, and has an address.
    pub fn on_default_interface() -> Result<Self, CaptureError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.is_up() && !iface.is_loopback() && !iface.ips.is_empty())
            .ok_or_else(|| {
                CaptureError::InterfaceNotFound("no suitable interface found".to_string())
            })?;

        Ok(Self::with_interface(interface))
    }

    fn with_interface(interface: NetworkInterface) -> Self {
        Self {
            interface,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// List all available network interfaces.
    pub fn list_interfaces() -> Vec<String> {
        datalink::interfaces()
            .into_iter()
            .map(|iface| {
                let status = if iface.is_up() { "UP" } else { "DOWN" };
                let ips: Vec<_> = iface.ips.iter().map(|ip| ip.to_string()).collect();
                format!(
                    "{}: {} [{}]",
                    iface.name,
                    status,
                    if ips.is_empty() {
                        "no IP".to_string()
                    } else {
                        ips.join(", ")
                    }
                )
            })
            .collect()
    }
}

impl PacketCapture for PnetCapture {
    fn capture_packets(&mut self) -> Result<PacketIter<'_>, CaptureError> {
        let config = Config {
            read_timeout: Some(READ_TIMEOUT),
            ..Config::default()
        };

        let rx = match datalink::channel(&self.interface, config) {
            Ok(Channel::Ethernet(_tx, rx)) => rx,
            Ok(_) => {
                return Err(CaptureError::ChannelCreation(
                    "unsupported channel type".to_string(),
                ))
            }
            Err(e) => {
                let msg = e.to_string();
                if e.kind() == std::io::ErrorKind::PermissionDenied
                    || msg.contains("permission")
                    || msg.contains("Operation not permitted")
                {
                    return Err(CaptureError::InsufficientPermissions);
                }
                return Err(CaptureError::ChannelCreation(msg));
            }
        };

        tracing::info!("Capture channel open on {}", self.interface.name);

        Ok(Box::new(FrameIterator::new(rx, Arc::clone(&self.running))))
    }

    fn interface_name(&self) -> &str {
        &self.interface.name
    }

    fn set_running(&mut self, running: Arc<AtomicBool>) {
        self.running = running;
    }
}

/// Iterator that yields every frame received on the channel.
///
/// Read timeouts and interrupted reads are retried; any other read error
/// is yielded once and ends the capture.
struct FrameIterator {
    rx: Box<dyn datalink::DataLinkReceiver>,
    running: Arc<AtomicBool>,
    failed: bool,
}

impl FrameIterator {
    fn new(rx: Box<dyn datalink::DataLinkReceiver>, running: Arc<AtomicBool>) -> Self {
        Self {
            rx,
            running,
            failed: false,
        }
    }
}

impl Iterator for FrameIterator {
    type Item = Result<RawPacket, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while self.running.load(Ordering::SeqCst) {
            match self.rx.next() {
                Ok(frame) => return Some(Ok(RawPacket::new(frame.to_vec()))),
                Err(e) if is_transient(&e) => continue,
                Err(e) => {
                    tracing::error!("Capture read failed: {}", e);
                    self.failed = true;
                    return Some(Err(CaptureError::Read(e)));
                }
            }
        }
        None
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Receiver that replays a fixed script of reads.
    struct ScriptedReceiver {
        script: VecDeque<io::Result<Vec<u8>>>,
        current: Vec<u8>,
        reads: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl datalink::DataLinkReceiver for ScriptedReceiver {
        fn next(&mut self) -> io::Result<&[u8]> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            match self.script.pop_front() {
                Some(Ok(frame)) => {
                    self.current = frame;
                    Ok(&self.current)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "idle")),
            }
        }
    }

    fn iterator(
        script: Vec<io::Result<Vec<u8>>>,
    ) -> (FrameIterator, Arc<std::sync::atomic::AtomicUsize>) {
        let reads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let rx = ScriptedReceiver {
            script: script.into(),
            current: Vec::new(),
            reads: Arc::clone(&reads),
        };
        (
            FrameIterator::new(Box::new(rx), Arc::new(AtomicBool::new(true))),
            reads,
        )
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let (mut frames, _) = iterator(vec![
            Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
            Err(io::Error::new(io::ErrorKind::WouldBlock, "again")),
            Ok(vec![0xab; 60]),
        ]);

        let packet = frames.next().unwrap().unwrap();

        assert_eq!(packet.len(), 60);
    }

    #[test]
    fn test_hard_error_ends_capture() {
        let (mut frames, reads) = iterator(vec![
            Ok(vec![0u8; 42]),
            Err(io::Error::new(io::ErrorKind::Other, "network is down")),
            Ok(vec![0u8; 42]),
        ]);

        assert!(frames.next().unwrap().is_ok());
        assert!(matches!(frames.next(), Some(Err(CaptureError::Read(_)))));
        assert!(frames.next().is_none());
        assert!(frames.next().is_none());
        // No reads after the failure
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cleared_running_flag_stops_capture() {
        let (mut frames, reads) = iterator(vec![Ok(vec![0u8; 42])]);
        frames.running.store(false, Ordering::SeqCst);

        assert!(frames.next().is_none());
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }
}
