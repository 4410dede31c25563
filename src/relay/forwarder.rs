//! Capture-to-sink forwarding loop.

use crate::capture::PacketCapture;
use crate::error::RelayError;
use crate::parser::IpExtractor;
use crate::sink::RecordSink;

/// Counters for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Frames read from the capture source
    pub captured: u64,
    /// Frames dropped for lack of an IP layer
    pub skipped: u64,
    /// Records delivered to the sink
    pub sent: u64,
}

/// Drives packets from a capture source through the extractor to a sink.
///
/// Runs synchronously: one frame is fully delivered before the next one
/// is read.
pub struct Relay<C, S> {
    capture: C,
    sink: S,
    extractor: IpExtractor,
    max_packets: Option<u64>,
}

impl<C: PacketCapture, S: RecordSink> Relay<C, S> {
    pub fn new(capture: C, sink: S) -> Self {
        Self {
            capture,
            sink,
            extractor: IpExtractor::new(),
            max_packets: None,
        }
    }

    /// Use a custom extractor (e.g. with IPv6 enabled).
    pub fn with_extractor(mut self, extractor: IpExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Stop after this many records have been sent.
    pub fn with_max_packets(mut self, max_packets: Option<u64>) -> Self {
        self.max_packets = max_packets;
        self
    }

    pub fn capture_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Relay packets until the capture ends, the packet limit is reached,
    /// or the capture or sink fails.
    ///
    /// The first capture or sink error ends the run and is returned. `on_stop` is
    /// called on the sink in every case once `on_start` has been.
    pub fn run(&mut self) -> Result<RelayStats, RelayError> {
        let interface = self.capture.interface_name().to_string();
        self.sink.on_start(&interface);

        let mut stats = RelayStats::default();
        let result = self.forward(&mut stats);
        self.sink.on_stop();

        tracing::info!(
            "Relay stopped: {} captured, {} skipped, {} sent",
            stats.captured,
            stats.skipped,
            stats.sent
        );

        result.map(|()| stats)
    }

    fn forward(&mut self, stats: &mut RelayStats) -> Result<(), RelayError> {
        if self.max_packets == Some(0) {
            return Ok(());
        }

        let Self {
            capture,
            sink,
            extractor,
            max_packets,
        } = self;

        for packet in capture.capture_packets()? {
            let packet = packet?;
            stats.captured += 1;

            let Some(record) = extractor.extract(&packet) else {
                stats.skipped += 1;
                continue;
            };

            sink.send(&record)?;
            stats.sent += 1;

            if max_packets.is_some_and(|max| stats.sent >= max) {
                tracing::info!("Packet limit of {} reached", stats.sent);
                break;
            }
        }

        Ok(())
    }
}
