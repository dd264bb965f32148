//! Entry error and event types.

use thiserror::Error;

/// Why an entry lost its connection.
///
/// Reported to the consumer right before the entry transitions to
/// `ReconnectPending` (client) or `Disconnected` (accepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Socket error during read or write.
    IoError,
    /// The peer closed the connection.
    PeerClosed,
    /// A package announced a body above `max_valid_package_size`, or
    /// its header was malformed.
    InvalidPackage,
    /// A heartbeat package carried a nonzero body.
    InvalidHeartbeatPackage,
    /// A package carried a content type outside the protocol.
    UnknownContentType,
    /// A message package carried a tag outside the message set.
    UnknownMessageTag,
    /// A message body failed to parse.
    ParseFailure,
    /// The peer did not answer a heartbeat request in time.
    HeartbeatReplyTimeout,
}

/// Failure to hand a message to an entry.
#[derive(Error, Debug)]
pub enum SendError<P> {
    /// The entry is not in a phase that permits sending; the message is
    /// handed back untouched. There is no queuing across reconnects.
    #[error("entry is not connected")]
    NotConnected { message: P },

    /// The entry task has terminated.
    #[error("entry is closed")]
    Closed { message: P },
}

impl<P> SendError<P> {
    /// Recover the message that could not be sent.
    pub fn into_message(self) -> P {
        match self {
            SendError::NotConnected { message } => message,
            SendError::Closed { message } => message,
        }
    }
}

/// Invalid configuration input, surfaced synchronously at startup.
#[derive(Error, Debug)]
#[error("invalid entry configuration: {source}")]
pub struct ConfigError {
    #[from]
    source: serde_json::Error,
}
