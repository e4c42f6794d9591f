//! Transport layer for Courier.
//!
//! Provides the [`Transport`] and [`Connection`] traits that the server
//! drives, plus the raw TCP implementation ([`TcpTransport`],
//! [`TcpConnection`]) the frame protocol runs over.
//!
//! The transport only moves bytes. It has no idea where one frame ends
//! and the next begins; that is the codec's job one layer up.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{ReadOutcome, TcpConnection, TcpTransport, WriteOutcome};

use std::fmt;

/// Process-unique identifier for an accepted connection.
///
/// Ids are handed out from a monotonically increasing counter and are never
/// reused for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw counter value. Used by tests and the transport's own
    /// id allocator.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listening endpoint that hands out byte-stream connections.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves with the next client that finished connecting.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Closes the listening side. An `accept` in flight, or any later one,
    /// fails instead of waiting for clients.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One accepted client socket.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes all of `data` to the peer.
    ///
    /// Concurrent calls on the same connection never interleave: each
    /// call holds the connection's write lock until its bytes are out.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Waits for the next chunk of bytes from the peer.
    ///
    /// Returns `Ok(None)` when the peer closed its side (EOF).
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Half-closes the socket so the peer reads EOF after the last frame.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
