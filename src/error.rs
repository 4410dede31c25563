//! Error types for the packet relay.

use thiserror::Error;

/// Errors raised while opening or reading a capture source.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Failed to create capture channel: {0}")]
    ChannelCreation(String),

    #[error("Insufficient permissions to capture packets (try running as root)")]
    InsufficientPermissions,

    #[error("Capture read failed: {0}")]
    Read(#[source] std::io::Error),
}

/// Errors raised by a record sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: Box<tungstenite::Error>,
    },

    #[error("Failed to send record: {0}")]
    Send(#[source] Box<tungstenite::Error>),

    #[error("Failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid endpoint '{0}': must start with ws:// or wss://")]
    InvalidEndpoint(String),
}

/// Errors that stop the relay loop.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
