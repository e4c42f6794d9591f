/// Errors raised by the TCP transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a pending connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Writing to the peer failed. The connection should be dropped.
    #[error("send failed on {conn}: {source}")]
    SendFailed {
        conn: crate::ConnectionId,
        #[source]
        source: std::io::Error,
    },

    /// Reading from the peer failed. The connection should be dropped.
    #[error("receive failed on {conn}: {source}")]
    ReceiveFailed {
        conn: crate::ConnectionId,
        #[source]
        source: std::io::Error,
    },

    /// The transport stopped accepting connections.
    #[error("transport shut down")]
    Shutdown,
}
