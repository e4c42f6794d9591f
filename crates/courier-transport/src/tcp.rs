//! Raw TCP transport built on `tokio::net`.
//!
//! Each accepted stream is split into owned read and write halves, each
//! behind its own async mutex. The write mutex is the per-connection
//! write lock: two deliveries to the same peer can never interleave
//! their bytes, while writes to different peers never contend.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Size of the buffer used by [`TcpConnection::recv`].
const READ_CHUNK: usize = 4096;

/// A TCP listener producing [`TcpConnection`]s.
pub struct TcpTransport {
    listener: TcpListener,
    closed: AtomicBool,
    shutdown: Notify,
}

impl TcpTransport {
    /// Binds the listener to `addr` (e.g. `"0.0.0.0:7777"`).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            TransportError::Bind {
                addr: addr.to_string(),
                source,
            }
        })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    /// Returns the address the listener is bound to. Useful when binding
    /// to port 0 in tests.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }

        let (stream, addr) = tokio::select! {
            res = self.listener.accept() => {
                res.map_err(TransportError::AcceptFailed)?
            }
            _ = self.shutdown.notified() => {
                return Err(TransportError::Shutdown);
            }
        };

        let conn = TcpConnection::from_stream(stream, addr);
        tracing::debug!(id = %conn.id(), %addr, "accepted TCP connection");
        Ok(conn)
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        self.closed.store(true, Ordering::Release);
        self.shutdown.notify_one();
        Ok(())
    }
}

/// Result of a single non-blocking read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were copied into the caller's buffer.
    Data(usize),
    /// Nothing available right now; wait for the next readiness event.
    WouldBlock,
    /// The peer closed its side of the stream.
    Closed,
}

/// Result of a single non-blocking write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The first `n` bytes of the caller's buffer were written.
    Written(usize),
    /// The socket cannot take more bytes right now.
    WouldBlock,
}

/// One accepted TCP stream.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Wraps an already-connected stream, assigning it a fresh id.
    pub fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        // Frames are small and latency matters more than packet count.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
        let (reader, writer) = stream.into_split();
        Self {
            id: ConnectionId::new(
                NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ),
            peer,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Waits until the socket has data (or EOF/error) to read.
    ///
    /// This is the readiness half of the reactor: it never consumes bytes,
    /// so it is safe to drop the returned future at any point.
    pub async fn readable(&self) -> Result<(), TransportError> {
        let reader = self.reader.lock().await;
        reader
            .readable()
            .await
            .map_err(|source| TransportError::ReceiveFailed {
                conn: self.id,
                source,
            })
    }

    /// Attempts one non-blocking read into `buf`.
    ///
    /// Returns [`ReadOutcome::WouldBlock`] if the socket has no data ready
    /// or another task currently holds the read half.
    pub fn try_recv(
        &self,
        buf: &mut [u8],
    ) -> Result<ReadOutcome, TransportError> {
        let Ok(reader) = self.reader.try_lock() else {
            return Ok(ReadOutcome::WouldBlock);
        };
        match reader.try_read(buf) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                Ok(ReadOutcome::WouldBlock)
            }
            Err(source) => Err(TransportError::ReceiveFailed {
                conn: self.id,
                source,
            }),
        }
    }
}

impl TcpConnection {
    /// Waits until the socket can accept more bytes.
    ///
    /// Like [`readable`](Self::readable), this never writes anything and
    /// may be dropped at any point.
    pub async fn writable(&self) -> Result<(), TransportError> {
        let writer = self.writer.lock().await;
        writer
            .writable()
            .await
            .map_err(|source| TransportError::SendFailed {
                conn: self.id,
                source,
            })
    }

    /// Attempts one non-blocking write of `data`.
    ///
    /// May write only a prefix. Returns [`WriteOutcome::WouldBlock`] if the
    /// socket buffer is full or another task holds the write half.
    pub fn try_send(
        &self,
        data: &[u8],
    ) -> Result<WriteOutcome, TransportError> {
        let Ok(writer) = self.writer.try_lock() else {
            return Ok(WriteOutcome::WouldBlock);
        };
        match writer.try_write(data) {
            Ok(n) => Ok(WriteOutcome::Written(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                Ok(WriteOutcome::WouldBlock)
            }
            Err(source) => Err(TransportError::SendFailed {
                conn: self.id,
                source,
            }),
        }
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(|source| TransportError::SendFailed {
                conn: self.id,
                source,
            })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut buf = vec![0u8; READ_CHUNK];
        let n = self
            .reader
            .lock()
            .await
            .read(&mut buf)
            .await
            .map_err(|source| TransportError::ReceiveFailed {
                conn: self.id,
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer.lock().await.shutdown().await.map_err(|source| {
            TransportError::SendFailed {
                conn: self.id,
                source,
            }
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
