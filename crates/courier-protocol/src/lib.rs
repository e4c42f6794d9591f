//! Wire protocol for Courier.
//!
//! This crate defines the frames clients and the server exchange and the
//! codec that carves them out of a raw byte stream:
//!
//! - **Types** ([`Frame`], [`Command`]): one message: command, headers,
//!   optional body.
//! - **Codec** ([`FrameDecoder`], [`encode`]): NUL-delimited framing.
//! - **Errors** ([`ProtocolError`]): conditions that make a byte stream
//!   unusable.
//!
//! The protocol layer knows nothing about connections, sessions, or
//! topics. Interpreting a frame is the engine's job.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame) → Engine (session, topics)
//! ```

mod codec;
mod error;
mod frame;

pub use codec::{
    DEFAULT_MAX_FRAME_SIZE, FRAME_TERMINATOR, FrameDecoder, encode,
};
pub use error::ProtocolError;
pub use frame::{Command, Frame};
