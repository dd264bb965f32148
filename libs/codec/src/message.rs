//! Protocol message sets and the tag dispatch table.
//!
//! A protocol is a closed set of message types, each assigned a numeric
//! wire tag carried in the header's `content_specific_value`. The set is
//! declared once with [`message_set!`](crate::message_set) and fixed at
//! compile time; there is no runtime registration.

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use zerocopy::AsBytes;

use crate::error::{CodecError, CodecResult};
use crate::header::{PkgContentType, PkgHeader};

/// A closed set of protocol messages with a bidirectional tag mapping.
///
/// Implemented by the enum a [`message_set!`](crate::message_set)
/// invocation generates. The mapping is used both to tag outgoing frames
/// and to select the decode branch for incoming ones; a tag outside the
/// set fails with [`CodecError::UnknownMessageTag`] before any parse is
/// attempted.
pub trait MessageSet: Sized + Send + 'static {
    /// Wire tag of this message's concrete type.
    fn wire_tag(&self) -> u16;

    /// Decode the body of a message package carrying `tag`.
    fn decode(tag: u16, body: &[u8]) -> CodecResult<Self>;

    /// Serialize the message body into `buf`, returning the byte count.
    fn encode_body(&self, buf: &mut BytesMut) -> CodecResult<usize>;
}

/// Deserialize one message body. Helper for generated message sets.
pub fn decode_body<M: DeserializeOwned>(tag: u16, body: &[u8]) -> CodecResult<M> {
    bincode::deserialize(body).map_err(|source| CodecError::MessageDecode { tag, source })
}

/// Serialize one message body into `buf`. Helper for generated message sets.
pub fn encode_body<M: Serialize>(message: &M, buf: &mut BytesMut) -> CodecResult<usize> {
    let body = bincode::serialize(message).map_err(CodecError::MessageEncode)?;
    buf.extend_from_slice(&body);
    Ok(body.len())
}

/// Build the complete wire image (header plus serialized body) of a
/// message package.
pub fn make_package_image<P: MessageSet>(message: &P) -> CodecResult<Bytes> {
    let mut body = BytesMut::new();
    let body_len = message.encode_body(&mut body)?;

    let header = PkgHeader::new(
        PkgContentType::Message,
        message.wire_tag(),
        body_len as u32,
        0,
    );

    let mut image = BytesMut::with_capacity(PkgHeader::SIZE + body_len);
    image.extend_from_slice(header.as_bytes());
    image.extend_from_slice(&body);
    Ok(image.freeze())
}

/// Wire image of a heartbeat request package.
pub fn heartbeat_request_image() -> Bytes {
    Bytes::copy_from_slice(PkgHeader::heartbeat_request().as_bytes())
}

/// Wire image of a heartbeat reply package.
pub fn heartbeat_reply_image() -> Bytes {
    Bytes::copy_from_slice(PkgHeader::heartbeat_reply().as_bytes())
}

/// Declare a protocol's closed message set.
///
/// Generates an enum with one variant per message type, a `From` impl per
/// variant and the [`MessageSet`] implementation mapping each variant to
/// its wire tag. Each variant must use a distinct payload type.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// pub struct Ping { pub seq: u64 }
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// pub struct Pong { pub seq: u64 }
///
/// codec::message_set! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub enum PingPong {
///         1 => Ping(Ping),
///         2 => Pong(Pong),
///     }
/// }
/// ```
#[macro_export]
macro_rules! message_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $tag:literal => $variant:ident($ty:ty) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $( $variant($ty), )+
        }

        $(
            impl ::std::convert::From<$ty> for $name {
                fn from(message: $ty) -> Self {
                    Self::$variant(message)
                }
            }
        )+

        impl $crate::MessageSet for $name {
            fn wire_tag(&self) -> u16 {
                match self {
                    $( Self::$variant(_) => $tag, )+
                }
            }

            fn decode(tag: u16, body: &[u8]) -> $crate::CodecResult<Self> {
                match tag {
                    $( $tag => Ok(Self::$variant($crate::decode_body(tag, body)?)), )+
                    other => Err($crate::CodecError::UnknownMessageTag { tag: other }),
                }
            }

            fn encode_body(
                &self,
                buf: &mut $crate::bytes::BytesMut,
            ) -> $crate::CodecResult<usize> {
                match self {
                    $( Self::$variant(message) => $crate::encode_body(message, buf), )+
                }
            }
        }
    };
}
