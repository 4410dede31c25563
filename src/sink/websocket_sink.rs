//! WebSocket record sink.

use std::fmt;
use std::net::TcpStream;
use std::str::FromStr;
use std::time::Duration;

use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::domain::PacketRecord;
use crate::error::SinkError;
use crate::sink::RecordSink;

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// How long to wait for the peer to answer a close frame.
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// How the sink manages its connection to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// One connection, opened on the first record and reused.
    #[default]
    Persistent,
    /// Connect, send one frame, close, for every record.
    PerMessage,
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" => Ok(Self::Persistent),
            "per-message" | "per_message" => Ok(Self::PerMessage),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => write!(f, "persistent"),
            Self::PerMessage => write!(f, "per-message"),
        }
    }
}

/// Sends each record as a JSON text frame to a WebSocket endpoint.
///
/// Failures are returned to the caller; a socket that failed is dropped
/// and never reused.
pub struct WebSocketSink {
    endpoint: String,
    mode: ConnectionMode,
    close_timeout: Duration,
    socket: Option<Socket>,
}

impl WebSocketSink {
    /// Create a sink for the given `ws://` or `wss://` endpoint.
    ///
    /// No connection is made until the first record is sent.
    pub fn new(endpoint: impl Into<String>, mode: ConnectionMode) -> Self {
        Self {
            endpoint: endpoint.into(),
            mode,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            socket: None,
        }
    }

    /// Bound the wait for the peer's close reply (default 10 s).
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether a persistent connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn connect(&self) -> Result<Socket, SinkError> {
        let (socket, response) =
            tungstenite::connect(self.endpoint.as_str()).map_err(|e| SinkError::Connect {
                endpoint: self.endpoint.clone(),
                source: Box::new(e),
            })?;
        tracing::debug!(
            "Connected to {} (status {})",
            self.endpoint,
            response.status()
        );
        Ok(socket)
    }

    fn send_persistent(&mut self, text: String) -> Result<(), SinkError> {
        let mut socket = match self.socket.take() {
            Some(socket) => socket,
            None => {
                let socket = self.connect()?;
                tracing::info!("WebSocket connection open to {}", self.endpoint);
                socket
            }
        };

        socket
            .send(Message::Text(text))
            .map_err(|e| SinkError::Send(Box::new(e)))?;
        self.socket = Some(socket);
        Ok(())
    }

    fn send_per_message(&mut self, text: String) -> Result<(), SinkError> {
        let mut socket = self.connect()?;
        socket
            .send(Message::Text(text))
            .map_err(|e| SinkError::Send(Box::new(e)))?;
        close(&mut socket, self.close_timeout);
        Ok(())
    }
}

impl RecordSink for WebSocketSink {
    fn send(&mut self, record: &PacketRecord) -> Result<(), SinkError> {
        let text = record.to_json()?;
        tracing::debug!("Sending {}", text);

        match self.mode {
            ConnectionMode::Persistent => self.send_persistent(text),
            ConnectionMode::PerMessage => self.send_per_message(text),
        }
    }

    fn on_start(&mut self, interface: &str) {
        tracing::info!(
            "Relaying packets from {} to {} ({} connection)",
            interface,
            self.endpoint,
            self.mode
        );
    }

    fn on_stop(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            close(&mut socket, self.close_timeout);
            tracing::info!("WebSocket connection to {} closed", self.endpoint);
        }
    }
}

/// Perform the closing handshake, draining frames until the peer answers
/// or `timeout` passes without a frame.
fn close(socket: &mut Socket, timeout: Duration) {
    if let Err(e) = socket.close(None) {
        tracing::debug!("Close failed: {}", e);
        return;
    }
    if let Err(e) = set_read_timeout(socket, timeout) {
        tracing::debug!("Failed to set close timeout: {}", e);
        return;
    }
    loop {
        match socket.read() {
            Ok(_) => continue,
            Err(tungstenite::Error::ConnectionClosed) => break,
            Err(tungstenite::Error::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                tracing::debug!("Peer did not answer close within {:?}", timeout);
                break;
            }
            Err(e) => {
                tracing::debug!("Close handshake ended: {}", e);
                break;
            }
        }
    }
}

fn set_read_timeout(socket: &mut Socket, timeout: Duration) -> std::io::Result<()> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout)),
        MaybeTlsStream::Rustls(stream) => stream.sock.set_read_timeout(Some(timeout)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, TcpListener};
    use std::sync::mpsc;
    use std::thread::{self, JoinHandle};
    use std::time::Instant;

    /// Accept `connections` clients and collect every text frame received.
    fn spawn_server(connections: usize) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let mut frames = Vec::new();
            for stream in listener.incoming().take(connections) {
                let mut ws = tungstenite::accept(stream.unwrap()).unwrap();
                while let Ok(msg) = ws.read() {
                    if let Message::Text(text) = msg {
                        frames.push(text);
                    }
                }
            }
            frames
        });

        (format!("ws://{}", addr), handle)
    }

    fn record(last_octet: u8, len: usize) -> PacketRecord {
        PacketRecord::new(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 254)),
            len,
        )
    }

    #[test]
    fn test_connection_mode_from_str() {
        assert_eq!("persistent".parse::<ConnectionMode>(), Ok(ConnectionMode::Persistent));
        assert_eq!("Per-Message".parse::<ConnectionMode>(), Ok(ConnectionMode::PerMessage));
        assert_eq!("per_message".parse::<ConnectionMode>(), Ok(ConnectionMode::PerMessage));
        assert!("pooled".parse::<ConnectionMode>().is_err());
    }

    #[test]
    fn test_new_does_not_connect() {
        let sink = WebSocketSink::new("ws://127.0.0.1:9", ConnectionMode::Persistent);
        assert!(!sink.is_connected());
        assert_eq!(sink.endpoint(), "ws://127.0.0.1:9");
    }

    #[test]
    fn test_persistent_reuses_one_connection() {
        let (endpoint, server) = spawn_server(1);
        let mut sink = WebSocketSink::new(endpoint, ConnectionMode::Persistent);

        sink.on_start("test0");
        sink.send(&record(1, 60)).unwrap();
        assert!(sink.is_connected());
        sink.send(&record(2, 1514)).unwrap();
        sink.on_stop();
        assert!(!sink.is_connected());

        let frames = server.join().unwrap();
        assert_eq!(
            frames,
            vec![
                r#"{"src":"10.0.0.1","dst":"10.0.0.254","len":60}"#.to_string(),
                r#"{"src":"10.0.0.2","dst":"10.0.0.254","len":1514}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_per_message_reconnects_each_record() {
        let (endpoint, server) = spawn_server(3);
        let mut sink = WebSocketSink::new(endpoint, ConnectionMode::PerMessage);

        for i in 1..=3 {
            sink.send(&record(i, 100)).unwrap();
            assert!(!sink.is_connected());
        }
        sink.on_stop();

        let frames = server.join().unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames[2].contains(r#""src":"10.0.0.3""#));
    }

    #[test]
    fn test_connect_failure_is_reported() {
        // Bind then drop to get a port with nothing listening
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut sink = WebSocketSink::new(format!("ws://127.0.0.1:{}", port), ConnectionMode::Persistent);

        let err = sink.send(&record(1, 60)).unwrap_err();

        assert!(matches!(err, SinkError::Connect { .. }));
        assert!(!sink.is_connected());
    }

    #[test]
    fn test_close_gives_up_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        // Complete the handshake, then never read or answer the close frame
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let _ws = tungstenite::accept(stream).unwrap();
            let _ = done_rx.recv();
        });

        let mut sink = WebSocketSink::new(format!("ws://{}", addr), ConnectionMode::PerMessage)
            .with_close_timeout(Duration::from_millis(200));

        let started = Instant::now();
        sink.send(&record(1, 60)).unwrap();
        let elapsed = started.elapsed();

        done_tx.send(()).unwrap();
        server.join().unwrap();

        assert!(elapsed < Duration::from_secs(5), "send took {:?}", elapsed);
    }

    #[test]
    fn test_on_stop_gives_up_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let _ws = tungstenite::accept(stream).unwrap();
            let _ = done_rx.recv();
        });

        let mut sink = WebSocketSink::new(format!("ws://{}", addr), ConnectionMode::Persistent)
            .with_close_timeout(Duration::from_millis(200));
        sink.send(&record(1, 60)).unwrap();

        let started = Instant::now();
        sink.on_stop();
        let elapsed = started.elapsed();

        done_tx.send(()).unwrap();
        server.join().unwrap();

        assert!(!sink.is_connected());
        assert!(elapsed < Duration::from_secs(5), "on_stop took {:?}", elapsed);
    }
}
