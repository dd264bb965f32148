//! Codec error types.

use thiserror::Error;

/// Errors raised while encoding or decoding wire data.
///
/// Framing variants (`Truncated` excluded) mean the input stream can no
/// longer be trusted: the connection that produced them must be torn down.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Not enough bytes to decode the requested item.
    #[error("truncated input: needed {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    /// The header announces a size smaller than the fixed layout.
    #[error(
        "malformed header: header_size_dwords {dwords} implies {implied} bytes, minimum is {minimum}"
    )]
    HeaderTooShort {
        dwords: u8,
        implied: usize,
        minimum: usize,
    },

    /// The announced body size exceeds the configured maximum.
    #[error("oversize package: content_size {size} exceeds max_valid_package_size {max}")]
    OversizePackage { size: u32, max: u32 },

    /// The package content type byte is not part of the protocol.
    #[error("unknown package content type: {value}")]
    UnknownContentType { value: u8 },

    /// The message-type tag has no entry in the protocol's message set.
    #[error("unrecognized message type tag: {tag}")]
    UnknownMessageTag { tag: u16 },

    /// A message body failed to deserialize.
    #[error("failed to decode message body for tag {tag}")]
    MessageDecode {
        tag: u16,
        #[source]
        source: bincode::Error,
    },

    /// A message body failed to serialize.
    #[error("failed to encode message body")]
    MessageEncode(#[source] bincode::Error),
}

/// Result type alias for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
