//! Per-connection plumbing shared by both dispatchers.
//!
//! A [`ConnectionDriver`] owns everything that belongs to exactly one
//! connection: its frame decoder, its protocol engine, and its
//! registration in the broker. Dispatchers feed it raw bytes and drain
//! the connection's outbound channel; they never look inside frames.
//!
//! The thread-per-connection dispatcher's task body,
//! [`serve_connection`], also lives here.

use std::sync::Arc;
use std::time::Duration;

use courier_broker::OutboundReceiver;
use courier_protocol::{FrameDecoder, encode};
use courier_session::SessionStore;
use courier_transport::{
    Connection, ConnectionId, TcpConnection, TransportError,
};

use crate::engine::{Action, ProtocolEngine};
use crate::server::ServerState;
use crate::CourierError;

/// How long the final flush may take before the socket is closed anyway.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// What the dispatcher should do with a connection after feeding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Close,
}

/// Decoder, engine and broker registration of one connection.
///
/// Dropping the driver unregisters the connection and logs its user out,
/// so the cleanup also runs when a dispatcher unwinds from a panic.
pub(crate) struct ConnectionDriver<S: SessionStore> {
    conn_id: ConnectionId,
    decoder: FrameDecoder,
    engine: ProtocolEngine<S>,
    state: Arc<ServerState<S>>,
}

impl<S: SessionStore> ConnectionDriver<S> {
    /// Registers `conn_id` with the broker and returns the driver together
    /// with the receiving end of the connection's outbound channel.
    pub(crate) fn open(
        conn_id: ConnectionId,
        state: Arc<ServerState<S>>,
    ) -> (Self, OutboundReceiver) {
        let (tx, rx) =
            courier_broker::outbound_channel(state.outbound_capacity);
        state.broker.register(conn_id, tx);
        let driver = Self {
            conn_id,
            decoder: FrameDecoder::with_max_size(state.max_frame_size),
            engine: ProtocolEngine::new(conn_id, Arc::clone(&state.store)),
            state,
        };
        (driver, rx)
    }

    /// Feeds bytes read from the socket.
    ///
    /// Frames are handed to the engine in order. Bytes following a frame
    /// that terminated the session are discarded.
    pub(crate) fn on_bytes(&mut self, bytes: &[u8]) -> Flow {
        for &byte in bytes {
            let frame = match self.decoder.feed(byte) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        conn = %self.conn_id,
                        error = %e,
                        "framing error, closing connection"
                    );
                    return Flow::Close;
                }
            };

            tracing::debug!(
                conn = %self.conn_id,
                command = %frame.command(),
                "frame received"
            );
            let actions = self.engine.process(frame);
            if self.apply(actions) == Flow::Close {
                return Flow::Close;
            }
        }
        Flow::Continue
    }

    fn apply(&self, actions: Vec<Action>) -> Flow {
        let broker = &self.state.broker;
        let mut flow = Flow::Continue;
        for action in actions {
            match action {
                Action::Reply(frame) => {
                    broker.send_to_connection(self.conn_id, frame);
                }
                Action::Publish { topic, frame } => {
                    broker.broadcast(&topic, &frame);
                }
                Action::Subscribe { topic, sub_id } => {
                    broker.subscribe(&topic, self.conn_id, &sub_id);
                }
                Action::Unsubscribe { topic } => {
                    broker.unsubscribe(&topic, self.conn_id);
                }
                Action::Disconnect => flow = Flow::Close,
            }
        }
        if self.engine.is_terminating() {
            flow = Flow::Close;
        }
        flow
    }

    /// Unregisters from the broker and shuts the engine down.
    ///
    /// Frames already queued on the outbound channel stay there for the
    /// dispatcher to flush.
    pub(crate) fn finish(self) {
        drop(self);
    }
}

impl<S: SessionStore> Drop for ConnectionDriver<S> {
    fn drop(&mut self) {
        self.state.broker.unregister(self.conn_id);
        self.engine.shutdown();
        tracing::debug!(conn = %self.conn_id, "connection finished");
    }
}

/// Writes `unsent` and every frame still queued for the connection, then
/// closes it. Gives up on the flush after [`FLUSH_TIMEOUT`].
pub(crate) async fn flush_and_close(
    conn: &TcpConnection,
    unsent: &[u8],
    outbound: &mut OutboundReceiver,
) {
    let flush = async {
        if !unsent.is_empty() {
            conn.send(unsent).await?;
        }
        while let Ok(frame) = outbound.try_recv() {
            conn.send(&encode(&frame)).await?;
        }
        Ok::<(), TransportError>(())
    };
    match tokio::time::timeout(FLUSH_TIMEOUT, flush).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(
                conn = %conn.id(),
                error = %e,
                "final flush failed"
            );
        }
        Err(_) => {
            tracing::debug!(conn = %conn.id(), "final flush timed out");
        }
    }
    if let Err(e) = conn.close().await {
        tracing::trace!(conn = %conn.id(), error = %e, "close failed");
    }
}

/// Serves one connection from accept to close on its own task.
pub(crate) async fn serve_connection<S: SessionStore>(
    conn: TcpConnection,
    state: Arc<ServerState<S>>,
) -> Result<(), CourierError> {
    let conn_id = conn.id();
    tracing::info!(
        conn = %conn_id,
        peer = %conn.peer_addr(),
        "client connected"
    );

    let (mut driver, mut outbound) = ConnectionDriver::open(conn_id, state);

    let result = loop {
        tokio::select! {
            biased;

            queued = outbound.recv() => match queued {
                Some(frame) => {
                    if let Err(e) = conn.send(&encode(&frame)).await {
                        break Err(e.into());
                    }
                }
                None => {
                    tracing::debug!(conn = %conn_id, "outbound channel closed");
                    break Ok(());
                }
            },
            read = conn.recv() => match read {
                Ok(Some(bytes)) => {
                    if driver.on_bytes(&bytes) == Flow::Close {
                        break Ok(());
                    }
                }
                Ok(None) => {
                    tracing::debug!(conn = %conn_id, "peer closed connection");
                    break Ok(());
                }
                Err(e) => break Err(e.into()),
            },
        }
    };

    driver.finish();
    flush_and_close(&conn, &[], &mut outbound).await;
    tracing::info!(conn = %conn_id, "client disconnected");
    result
}
