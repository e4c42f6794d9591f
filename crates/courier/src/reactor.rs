//! Event-multiplexed dispatcher.
//!
//! A fixed pool of worker tasks serves every connection. The acceptor
//! hands each new connection to the next worker, round-robin. A worker
//! keeps one pending future per connection in a [`FuturesUnordered`];
//! each future resolves when its socket turns readable, when it turns
//! writable while output is backed up, or when a frame is queued on its
//! outbound channel.
//!
//! On readability the worker performs at most [`READ_BUDGET`]
//! non-blocking reads, feeds the bytes through the connection's driver,
//! and puts the connection back into the pending set. Output goes into a
//! per-connection buffer drained with non-blocking writes. A worker never
//! awaits a read or a write, so a client that stops reading stalls only
//! itself: its buffer stays full, its outbound queue fills up, and the
//! broker evicts it.

use std::sync::Arc;

use courier_broker::OutboundReceiver;
use courier_protocol::{Frame, encode};
use courier_session::SessionStore;
use courier_transport::{
    Connection, ReadOutcome, TcpConnection, TransportError, WriteOutcome,
};
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use tokio::sync::mpsc;

use crate::handler::{ConnectionDriver, Flow, flush_and_close};
use crate::server::{Dispatcher, ServerState};

/// Maximum non-blocking reads per readiness event.
const READ_BUDGET: usize = 16;

/// Size of a single non-blocking read.
const READ_CHUNK: usize = 4096;

/// Maximum frames moved from the outbound channel into the write buffer
/// per wake.
const WRITE_BATCH: usize = 32;

/// One connection owned by a reactor worker.
struct Slot<S: SessionStore> {
    conn: TcpConnection,
    driver: ConnectionDriver<S>,
    outbound: OutboundReceiver,
    /// Encoded bytes the socket has not accepted yet.
    unsent: Vec<u8>,
}

/// Why a slot woke up.
enum Event {
    Readable(Result<(), TransportError>),
    Writable(Result<(), TransportError>),
    Outbound(Option<Frame>),
}

impl<S: SessionStore> Slot<S> {
    fn open(conn: TcpConnection, state: Arc<ServerState<S>>) -> Self {
        let (driver, outbound) = ConnectionDriver::open(conn.id(), state);
        Self {
            conn,
            driver,
            outbound,
            unsent: Vec::new(),
        }
    }

    /// Waits for the next readiness or outbound event.
    ///
    /// While bytes are backed up the slot waits only for writability. It
    /// takes no more frames, which leaves them in the bounded channel, and
    /// reads no more input, which would only produce more output.
    /// Every branch is cancel-safe: readiness waits consume nothing and
    /// `recv` only completes once a frame is taken off the channel.
    async fn next_event(&mut self) -> Event {
        let backed_up = !self.unsent.is_empty();
        tokio::select! {
            biased;

            ready = self.conn.writable(), if backed_up => {
                Event::Writable(ready)
            }
            frame = self.outbound.recv(), if !backed_up => {
                Event::Outbound(frame)
            }
            ready = self.conn.readable(), if !backed_up => {
                Event::Readable(ready)
            }
        }
    }

    /// Handles one event. Returns `Flow::Close` when the connection is
    /// done.
    fn handle(&mut self, event: Event, buf: &mut [u8]) -> Flow {
        match event {
            Event::Outbound(Some(frame)) => {
                self.unsent.extend_from_slice(&encode(&frame));
                for _ in 1..WRITE_BATCH {
                    match self.outbound.try_recv() {
                        Ok(frame) => {
                            self.unsent.extend_from_slice(&encode(&frame));
                        }
                        Err(_) => break,
                    }
                }
                self.write_unsent()
            }
            Event::Outbound(None) => {
                tracing::debug!(
                    conn = %self.conn.id(),
                    "outbound channel closed"
                );
                Flow::Close
            }
            Event::Writable(Ok(())) => self.write_unsent(),
            Event::Readable(Ok(())) => self.read_available(buf),
            Event::Readable(Err(e)) | Event::Writable(Err(e)) => {
                tracing::debug!(error = %e, "readiness failed");
                Flow::Close
            }
        }
    }

    /// Writes as much of the backlog as the socket takes right now.
    fn write_unsent(&mut self) -> Flow {
        while !self.unsent.is_empty() {
            match self.conn.try_send(&self.unsent) {
                Ok(WriteOutcome::Written(0) | WriteOutcome::WouldBlock) => {
                    break;
                }
                Ok(WriteOutcome::Written(n)) => {
                    self.unsent.drain(..n);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "write failed");
                    return Flow::Close;
                }
            }
        }
        Flow::Continue
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Flow {
        for _ in 0..READ_BUDGET {
            // Pipelined requests queue replies to this very connection.
            // Let them drain before reading more, or the client evicts
            // itself.
            let high_water = (self.outbound.max_capacity() / 2).max(1);
            if self.outbound.len() >= high_water {
                return Flow::Continue;
            }
            match self.conn.try_recv(buf) {
                Ok(ReadOutcome::Data(n)) => {
                    if self.driver.on_bytes(&buf[..n]) == Flow::Close {
                        return Flow::Close;
                    }
                }
                Ok(ReadOutcome::WouldBlock) => return Flow::Continue,
                Ok(ReadOutcome::Closed) => {
                    tracing::debug!(
                        conn = %self.conn.id(),
                        "peer closed connection"
                    );
                    return Flow::Close;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "read failed");
                    return Flow::Close;
                }
            }
        }
        // Budget spent; the socket is likely still readable and will be
        // picked up again on the next turn.
        Flow::Continue
    }

    /// Cleans up and hands the final flush to its own task, so a peer
    /// that never drains its socket cannot hold the worker.
    fn teardown(self) {
        let Slot {
            conn,
            driver,
            mut outbound,
            unsent,
        } = self;
        driver.finish();
        tokio::spawn(async move {
            flush_and_close(&conn, &unsent, &mut outbound).await;
            tracing::info!(conn = %conn.id(), "client disconnected");
        });
    }
}

type Pending<S> = FuturesUnordered<BoxFuture<'static, (Slot<S>, Event)>>;

fn wait<S: SessionStore>(
    mut slot: Slot<S>,
) -> BoxFuture<'static, (Slot<S>, Event)> {
    async move {
        let event = slot.next_event().await;
        (slot, event)
    }
    .boxed()
}

/// Runs one reactor worker until its inbox closes and every connection
/// it owns has finished.
async fn run_worker<S: SessionStore>(
    index: usize,
    mut inbox: mpsc::UnboundedReceiver<TcpConnection>,
    state: Arc<ServerState<S>>,
) {
    let mut pending: Pending<S> = FuturesUnordered::new();
    let mut buf = vec![0u8; READ_CHUNK];
    let mut accepting = true;

    tracing::debug!(worker = index, "reactor worker started");
    loop {
        tokio::select! {
            incoming = inbox.recv(), if accepting => match incoming {
                Some(conn) => {
                    tracing::info!(
                        conn = %conn.id(),
                        peer = %conn.peer_addr(),
                        worker = index,
                        "client connected"
                    );
                    pending.push(wait(Slot::open(conn, Arc::clone(&state))));
                }
                None => accepting = false,
            },
            Some((mut slot, event)) = pending.next(), if !pending.is_empty() => {
                match slot.handle(event, &mut buf) {
                    Flow::Continue => pending.push(wait(slot)),
                    Flow::Close => slot.teardown(),
                }
            }
            else => break,
        }
    }
    tracing::debug!(worker = index, "reactor worker stopped");
}

/// Hands accepted connections to a fixed pool of reactor workers.
pub(crate) struct ReactorDispatcher {
    workers: Vec<mpsc::UnboundedSender<TcpConnection>>,
    next: usize,
}

impl ReactorDispatcher {
    /// Spawns `workers` worker tasks (at least one).
    pub(crate) fn spawn<S: SessionStore>(
        workers: usize,
        state: Arc<ServerState<S>>,
    ) -> Self {
        let workers = (0..workers.max(1))
            .map(|index| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(index, rx, Arc::clone(&state)));
                tx
            })
            .collect();
        Self { workers, next: 0 }
    }
}

impl Dispatcher for ReactorDispatcher {
    fn begin_connection(&mut self, conn: TcpConnection) {
        let index = self.next % self.workers.len();
        self.next = self.next.wrapping_add(1);
        if let Err(returned) = self.workers[index].send(conn) {
            tracing::error!(
                conn = %returned.0.id(),
                worker = index,
                "reactor worker gone, dropping connection"
            );
        }
    }
}
