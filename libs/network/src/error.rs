//! Transport error types.

use codec::CodecError;
use std::net::SocketAddr;
use thiserror::Error;

/// Main transport error type.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Address or interface name could not be resolved.
    #[error("resolution error: cannot resolve '{target}': {message}")]
    Resolution { target: String, message: String },

    /// Connecting to a resolved endpoint failed.
    #[error("connect error: {message} (remote: {remote_addr:?})")]
    Connect {
        message: String,
        remote_addr: Option<SocketAddr>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The peer violated the framing rules; the connection cannot be trusted.
    #[error("framing violation: {0}")]
    Framing(#[from] CodecError),

    /// Socket error during read/write.
    #[error("i/o error during {operation}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A watched operation exceeded its time budget.
    #[error("timeout: {operation} exceeded {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The peer closed the connection.
    #[error("connection closed by peer")]
    PeerClosed,

    /// Invalid configuration, surfaced synchronously at startup.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

impl NetworkError {
    /// Create a resolution error.
    pub fn resolution(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a connect error with its source.
    pub fn connect_error(
        message: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        source: std::io::Error,
    ) -> Self {
        Self::Connect {
            message: message.into(),
            remote_addr,
            source: Some(source),
        }
    }

    /// Create an I/O error tagged with the failed operation.
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// Create a timeout error.
    pub fn timeout(operation: &'static str, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation,
            timeout_ms,
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether retrying the operation (e.g. via a reconnect) makes sense.
    ///
    /// Framing violations are not retryable on the same connection: once
    /// the frame boundary is lost the stream is unusable.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Resolution { .. } => true,
            NetworkError::Connect { .. } => true,
            NetworkError::Io { .. } => true,
            NetworkError::Timeout { .. } => true,
            NetworkError::PeerClosed => true,
            NetworkError::Framing(_) => false,
            NetworkError::Configuration { .. } => false,
        }
    }

    /// Error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            NetworkError::Resolution { .. } => "resolution",
            NetworkError::Connect { .. } => "connect",
            NetworkError::Framing(_) => "framing",
            NetworkError::Io { .. } => "io",
            NetworkError::Timeout { .. } => "timeout",
            NetworkError::PeerClosed => "peer_closed",
            NetworkError::Configuration { .. } => "configuration",
        }
    }
}
