//! # Conduit Wire Codec
//!
//! Encoding and decoding rules for the Conduit package protocol:
//! the fixed 12-byte package header, frame assembly from a raw byte
//! stream, the closed message-set dispatch and the message parsing
//! engines.
//!
//! This crate is transport-agnostic on purpose: it never touches a
//! socket. The `network` crate feeds it bytes, the `proto-entry` crate
//! drives it from the protocol state machine.
//!
//! ## Wire format
//!
//! Every unit on the wire is a *package*: a [`PkgHeader`] followed by
//! `content_size` body bytes and `attached_binary_size` reserved
//! extension bytes. Byte order is the host's native order; the format
//! targets little-endian deployments and documents this rather than
//! normalizing.

pub mod engine;
pub mod error;
pub mod header;
pub mod input;
pub mod message;

// Re-exported for the `message_set!` macro expansion.
pub use bytes;

pub use engine::{ArenaEngine, Envelope, ParsingEngine, TrivialEngine};
pub use error::{CodecError, CodecResult};
pub use header::{PkgContentType, PkgHeader};
pub use input::{Frame, FrameInput};
pub use message::{
    decode_body, encode_body, heartbeat_reply_image, heartbeat_request_image,
    make_package_image, MessageSet,
};
