//! Fixed binary package header.
//!
//! Defines the 12-byte header prepending any binary package sent between
//! endpoints, and its (de)serialization. The header is a plain value
//! transform: no heap allocation on either path.

use num_enum::TryFromPrimitive;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::error::{CodecError, CodecResult};

/// What the binary content following a header is.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
pub enum PkgContentType {
    /// A protocol message; `content_specific_value` carries its type tag.
    Message = 0,
    /// Liveness probe initiated by a peer.
    HeartbeatRequest = 1,
    /// Answer to a heartbeat request.
    HeartbeatReply = 2,
}

/// A header prepending any binary package sent between endpoints.
///
/// Layout is `#[repr(C)]` with native byte order; the format targets a
/// little-endian deployment and documents this rather than normalizing.
/// `header_size_dwords` declares the header's own size in 4-byte words so
/// the format can grow: a decoder must consume exactly
/// `header_size_dwords * 4` bytes before trusting the body offset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
pub struct PkgHeader {
    /// A hint telling what the content of the following binary is.
    pub content_type: u8,
    /// Size of this header in dwords (32 bits).
    pub header_size_dwords: u8,
    /// Content specific data; carries the message-type tag for
    /// [`PkgContentType::Message`] packages.
    pub content_specific_value: u16,
    /// Size of the package body in bytes.
    pub content_size: u32,
    /// Size of the attached binary (reserved extension field).
    pub attached_binary_size: u32,
}

// The advertised dword size of the fixed layout must match the struct.
const _: () = assert!(std::mem::size_of::<PkgHeader>() == PkgHeader::SIZE);

impl PkgHeader {
    /// Size of the fixed header image in bytes.
    pub const SIZE: usize = 12;

    /// Size of the fixed header image in dwords.
    pub const SIZE_DWORDS: u8 = (Self::SIZE / 4) as u8;

    /// Create a header for a given content type.
    pub fn new(
        content_type: PkgContentType,
        content_specific_value: u16,
        content_size: u32,
        attached_binary_size: u32,
    ) -> Self {
        Self {
            content_type: content_type as u8,
            header_size_dwords: Self::SIZE_DWORDS,
            content_specific_value,
            content_size,
            attached_binary_size,
        }
    }

    /// Header of a heartbeat request package (empty body).
    pub fn heartbeat_request() -> Self {
        Self::new(PkgContentType::HeartbeatRequest, 0, 0, 0)
    }

    /// Header of a heartbeat reply package (empty body).
    pub fn heartbeat_reply() -> Self {
        Self::new(PkgContentType::HeartbeatReply, 0, 0, 0)
    }

    /// The header size this header advertises for itself, in bytes.
    pub fn advertised_header_size(&self) -> usize {
        self.header_size_dwords as usize * 4
    }

    /// Content type of the package, if it is one the protocol knows.
    pub fn content_type(&self) -> CodecResult<PkgContentType> {
        PkgContentType::try_from(self.content_type).map_err(|_| CodecError::UnknownContentType {
            value: self.content_type,
        })
    }

    /// Read the fixed header image from the head of `data`.
    ///
    /// Only the fixed 12-byte prefix is consumed here; callers skip the
    /// full advertised size when framing.
    pub fn parse(data: &[u8]) -> CodecResult<Self> {
        Self::read_from_prefix(data).ok_or(CodecError::Truncated {
            needed: Self::SIZE,
            available: data.len(),
        })
    }

    /// Validate the decoded header against the framing invariants.
    pub fn validate(&self, max_valid_package_size: u32) -> CodecResult<()> {
        if self.advertised_header_size() < Self::SIZE {
            return Err(CodecError::HeaderTooShort {
                dwords: self.header_size_dwords,
                implied: self.advertised_header_size(),
                minimum: Self::SIZE,
            });
        }

        if self.content_size > max_valid_package_size {
            return Err(CodecError::OversizePackage {
                size: self.content_size,
                max: max_valid_package_size,
            });
        }

        Ok(())
    }

    /// Parse and validate in one step.
    pub fn decode(data: &[u8], max_valid_package_size: u32) -> CodecResult<Self> {
        let header = Self::parse(data)?;
        header.validate(max_valid_package_size)?;
        Ok(header)
    }

    /// Total wire size of the package this header announces.
    pub fn package_size(&self) -> usize {
        self.advertised_header_size()
            + self.content_size as usize
            + self.attached_binary_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MAX: u32 = 100 * 1024 * 1024;

    #[test]
    fn fixed_layout_is_twelve_bytes() {
        let header = PkgHeader::new(PkgContentType::Message, 7, 42, 0);
        assert_eq!(header.as_bytes().len(), PkgHeader::SIZE);
        assert_eq!(header.advertised_header_size(), PkgHeader::SIZE);
    }

    #[test]
    fn decode_is_the_inverse_of_encode() {
        let header = PkgHeader::new(PkgContentType::Message, 300, 1024, 16);
        let decoded = PkgHeader::decode(header.as_bytes(), MAX).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let header = PkgHeader::heartbeat_request();
        let err = PkgHeader::parse(&header.as_bytes()[..7]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Truncated {
                needed: PkgHeader::SIZE,
                available: 7
            }
        ));
    }

    #[test]
    fn short_advertised_header_is_rejected() {
        let mut header = PkgHeader::heartbeat_request();
        header.header_size_dwords = 2;
        let err = PkgHeader::decode(header.as_bytes(), MAX).unwrap_err();
        assert!(matches!(err, CodecError::HeaderTooShort { dwords: 2, .. }));
    }

    #[test]
    fn oversize_content_is_rejected() {
        let header = PkgHeader::new(PkgContentType::Message, 1, MAX + 1, 0);
        let err = PkgHeader::decode(header.as_bytes(), MAX).unwrap_err();
        assert!(matches!(err, CodecError::OversizePackage { .. }));
    }

    #[test]
    fn unknown_content_type_is_reported() {
        let mut header = PkgHeader::heartbeat_request();
        header.content_type = 9;
        assert!(matches!(
            header.content_type().unwrap_err(),
            CodecError::UnknownContentType { value: 9 }
        ));
    }

    #[test]
    fn heartbeat_headers_have_empty_bodies() {
        for header in [PkgHeader::heartbeat_request(), PkgHeader::heartbeat_reply()] {
            assert_eq!(header.content_size, 0);
            assert_eq!(header.attached_binary_size, 0);
            assert_eq!(header.package_size(), PkgHeader::SIZE);
        }
    }

    proptest! {
        #[test]
        fn round_trip_law(
            content_type in 0u8..=2,
            tag in any::<u16>(),
            content_size in 0u32..=MAX,
            attached in any::<u32>(),
        ) {
            let content_type = PkgContentType::try_from(content_type).unwrap();
            let header = PkgHeader::new(content_type, tag, content_size, attached);
            let decoded = PkgHeader::decode(header.as_bytes(), MAX).unwrap();
            prop_assert_eq!(decoded, header);
        }
    }
}
