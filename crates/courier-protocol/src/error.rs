//! Error types for the protocol layer.

/// Errors produced while turning bytes into frames.
///
/// Protocol *violations* (missing headers, unknown commands, ...) are not
/// errors at this level: they decode into perfectly good [`Frame`]s that
/// the engine then rejects. Only conditions that make the byte stream
/// itself unusable show up here.
///
/// [`Frame`]: crate::Frame
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame grew past the decoder's size limit before its terminator
    /// arrived. The connection must be closed; the partial frame is
    /// discarded.
    #[error("frame exceeds maximum size of {limit} bytes")]
    FrameTooLarge { limit: usize },
}
