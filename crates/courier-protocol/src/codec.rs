//! Streaming frame codec.
//!
//! TCP hands us an unbounded stream of bytes with no message boundaries.
//! [`FrameDecoder`] scans that stream one byte at a time, accumulating
//! bytes until it sees the NUL terminator, then parses everything it
//! collected as one [`Frame`]. [`encode`] is the inverse.
//!
//! ```rust
//! use courier_protocol::{encode, Command, Frame, FrameDecoder};
//!
//! let frame = Frame::new(Command::Send)
//!     .with_header("destination", "/topic/news")
//!     .with_body("hello");
//!
//! let mut decoder = FrameDecoder::new();
//! let mut decoded = Vec::new();
//! for byte in encode(&frame) {
//!     if let Some(f) = decoder.feed(byte).unwrap() {
//!         decoded.push(f);
//!     }
//! }
//! assert_eq!(decoded, vec![frame]);
//! ```

use crate::{Frame, ProtocolError};

/// The byte that ends every frame on the wire.
pub const FRAME_TERMINATOR: u8 = 0;

/// Default upper bound on the size of a single frame (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20;

/// Initial capacity of the accumulation buffer. It doubles as needed.
const INITIAL_CAPACITY: usize = 1024;

/// Per-connection decoder state.
///
/// One decoder belongs to exactly one connection and is only ever driven
/// by that connection's handling task, so it needs no synchronisation.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_size: usize,
}

impl FrameDecoder {
    /// Creates a decoder with the default 1 MiB size limit.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a decoder that rejects frames longer than `max_size` bytes
    /// (terminator excluded).
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(INITIAL_CAPACITY.min(max_size.max(1))),
            max_size,
        }
    }

    /// Returns the configured size limit.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of bytes buffered towards the next frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feeds one byte.
    ///
    /// Returns `Ok(Some(frame))` when `byte` is the terminator and the
    /// bytes before it held a frame, `Ok(None)` when more input is needed
    /// (or the terminated input was empty filler).
    ///
    /// # Errors
    /// [`ProtocolError::FrameTooLarge`] if the pending frame would exceed
    /// the size limit. The buffer is cleared; the caller is expected to
    /// close the connection rather than resynchronise.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, ProtocolError> {
        if byte == FRAME_TERMINATOR {
            return Ok(self.pop_frame());
        }

        if self.buf.len() >= self.max_size {
            self.reset();
            return Err(ProtocolError::FrameTooLarge {
                limit: self.max_size,
            });
        }
        if self.buf.len() == self.buf.capacity() {
            // Grow by doubling, capped at the limit.
            let target = (self.buf.capacity() * 2)
                .max(INITIAL_CAPACITY)
                .min(self.max_size);
            self.buf.reserve_exact(target - self.buf.len());
        }
        self.buf.push(byte);
        Ok(None)
    }

    /// Feeds a chunk of bytes, collecting every frame it completes.
    ///
    /// # Errors
    /// Stops at the first [`ProtocolError`]. Frames completed earlier in
    /// the chunk are discarded along with it, so a connection that sent an
    /// oversized frame gets nothing from that read delivered.
    pub fn decode(
        &mut self,
        bytes: &[u8],
    ) -> Result<Vec<Frame>, ProtocolError> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if let Some(frame) = self.feed(byte)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    /// Drops any partially accumulated frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        if self.buf.capacity() > INITIAL_CAPACITY * 64 {
            self.buf.shrink_to(INITIAL_CAPACITY);
        }
    }

    fn pop_frame(&mut self) -> Option<Frame> {
        if self.buf.is_empty() {
            tracing::trace!("dropping empty frame");
            return None;
        }
        let text = String::from_utf8_lossy(&self.buf);
        let frame = Frame::parse(&text);
        self.reset();
        frame
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes a frame for the wire, terminator included.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut bytes = frame.to_wire_string().into_bytes();
    bytes.push(FRAME_TERMINATOR);
    bytes
}
