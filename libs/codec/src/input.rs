//! Package frame assembly from a raw byte stream.
//!
//! [`FrameInput`] consumes incoming byte chunks and yields complete
//! frames, taking care of packages split across chunk boundaries. The
//! connection reads straight into the accumulator buffer; bodies are
//! handed out as reference-counted slices of it.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::CodecResult;
use crate::header::PkgHeader;

/// One complete header-plus-body unit taken off the wire.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: PkgHeader,
    /// The `content_size` bytes following the header.
    pub body: Bytes,
    /// The `attached_binary_size` reserved extension bytes (normally empty).
    pub attached: Bytes,
}

/// An input stream for reading packages.
///
/// Appending buffers may complete several packages at once;
/// [`FrameInput::next_frame`] is intended to be called in a loop until it
/// reports that more input is needed.
#[derive(Debug)]
pub struct FrameInput {
    buf: BytesMut,
    max_valid_package_size: u32,
}

impl FrameInput {
    pub fn new(max_valid_package_size: u32) -> Self {
        Self::with_capacity(max_valid_package_size, 0)
    }

    /// Create an input stream with a pre-sized accumulator.
    pub fn with_capacity(max_valid_package_size: u32, capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            max_valid_package_size,
        }
    }

    /// Append a chunk of raw input bytes.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed as frames.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Direct access to the accumulator, for reading from a socket
    /// without an intermediate copy.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Take the next complete frame off the stream.
    ///
    /// Returns `Ok(None)` when more input is needed. A framing error
    /// (oversize or malformed header) invalidates the stream for further
    /// consuming; the owning connection must be torn down.
    pub fn next_frame(&mut self) -> CodecResult<Option<Frame>> {
        if self.buf.len() < PkgHeader::SIZE {
            return Ok(None);
        }

        let header = PkgHeader::decode(&self.buf, self.max_valid_package_size)?;

        if self.buf.len() < header.package_size() {
            return Ok(None);
        }

        // Consume exactly the advertised header size; a future format
        // revision may carry more than the fixed layout.
        self.buf.advance(header.advertised_header_size());

        let body = self.buf.split_to(header.content_size as usize).freeze();
        let attached = self
            .buf
            .split_to(header.attached_binary_size as usize)
            .freeze();

        Ok(Some(Frame {
            header,
            body,
            attached,
        }))
    }
}
