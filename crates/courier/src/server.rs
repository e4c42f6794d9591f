//! `CourierServer` builder, configuration and accept loop.
//!
//! This is the entry point for running a Courier server. It ties the
//! layers together: transport → codec → engine → broker, with the
//! session store injected by the caller.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use courier_broker::{Broker, DEFAULT_OUTBOUND_CAPACITY};
use courier_protocol::DEFAULT_MAX_FRAME_SIZE;
use courier_session::{InMemorySessionStore, SessionStore};
use courier_transport::{TcpConnection, TcpTransport, Transport, TransportError};

use crate::handler::serve_connection;
use crate::reactor::ReactorDispatcher;
use crate::CourierError;

/// How accepted connections are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// One task per connection (`tpc`).
    #[default]
    ThreadPerConnection,
    /// A fixed pool of workers multiplexing readiness (`reactor`).
    Reactor,
}

impl ServerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThreadPerConnection => "tpc",
            Self::Reactor => "reactor",
        }
    }
}

impl FromStr for ServerMode {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tpc" => Ok(Self::ThreadPerConnection),
            "reactor" => Ok(Self::Reactor),
            other => Err(CourierError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,
    pub mode: ServerMode,
    /// Number of reactor workers. Ignored in thread-per-connection mode.
    pub reactor_workers: usize,
    /// Largest accepted frame, in bytes, terminator excluded.
    pub max_frame_size: usize,
    /// Frames queued for one connection before it is evicted as a slow
    /// consumer.
    pub outbound_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".to_string(),
            mode: ServerMode::default(),
            reactor_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

/// State shared by every connection.
pub(crate) struct ServerState<S: SessionStore> {
    pub(crate) broker: Arc<Broker>,
    pub(crate) store: Arc<S>,
    pub(crate) max_frame_size: usize,
    pub(crate) outbound_capacity: usize,
}

/// Takes ownership of newly accepted connections.
///
/// The accept loop is the same for every scheduling strategy; only what
/// happens to a connection after `accept` differs.
pub(crate) trait Dispatcher: Send {
    fn begin_connection(&mut self, conn: TcpConnection);
}

/// Spawns one task per connection.
struct TaskPerConnection<S: SessionStore> {
    state: Arc<ServerState<S>>,
}

impl<S: SessionStore> Dispatcher for TaskPerConnection<S> {
    fn begin_connection(&mut self, conn: TcpConnection) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(e) = serve_connection(conn, state).await {
                tracing::debug!(error = %e, "connection ended with error");
            }
        });
    }
}

/// Builder for configuring and starting a Courier server.
///
/// # Example
///
/// ```rust,no_run
/// use courier::prelude::*;
///
/// # async fn run() -> Result<(), CourierError> {
/// let server = CourierServer::builder()
///     .bind("0.0.0.0:7777")
///     .mode(ServerMode::Reactor)
///     .build(InMemorySessionStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CourierServerBuilder {
    config: ServerConfig,
}

impl CourierServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn mode(mut self, mode: ServerMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn reactor_workers(mut self, workers: usize) -> Self {
        self.config.reactor_workers = workers;
        self
    }

    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.config.max_frame_size = bytes;
        self
    }

    pub fn outbound_capacity(mut self, frames: usize) -> Self {
        self.config.outbound_capacity = frames;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener. Connections are not accepted until
    /// [`CourierServer::run`] is called.
    pub async fn build<S: SessionStore>(
        self,
        store: S,
    ) -> Result<CourierServer<S>, CourierError> {
        let transport = TcpTransport::bind(&self.config.bind_addr).await?;
        let state = Arc::new(ServerState {
            broker: Arc::new(Broker::new()),
            store: Arc::new(store),
            max_frame_size: self.config.max_frame_size,
            outbound_capacity: self.config.outbound_capacity,
        });
        Ok(CourierServer {
            transport,
            state,
            config: self.config,
        })
    }
}

/// A bound Courier server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CourierServer<S: SessionStore> {
    transport: TcpTransport,
    state: Arc<ServerState<S>>,
    config: ServerConfig,
}

impl CourierServer<InMemorySessionStore> {
    /// Creates a new builder.
    ///
    /// Lives on the in-memory instantiation so `CourierServer::builder()`
    /// needs no type annotation. The builder itself accepts any
    /// [`SessionStore`] in [`CourierServerBuilder::build`].
    pub fn builder() -> CourierServerBuilder {
        CourierServerBuilder::new()
    }
}

impl<S: SessionStore> CourierServer<S> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The broker shared by all connections, for introspection.
    pub fn broker(&self) -> Arc<Broker> {
        Arc::clone(&self.state.broker)
    }

    /// The session store shared by all connections.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.state.store)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), CourierError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Connections already accepted keep being served by their tasks or
    /// workers after this returns.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), CourierError> {
        let mut dispatcher: Box<dyn Dispatcher> = match self.config.mode {
            ServerMode::ThreadPerConnection => Box::new(TaskPerConnection {
                state: Arc::clone(&self.state),
            }),
            ServerMode::Reactor => Box::new(ReactorDispatcher::spawn(
                self.config.reactor_workers,
                Arc::clone(&self.state),
            )),
        };
        tracing::info!(
            addr = %self.config.bind_addr,
            mode = %self.config.mode,
            "Courier server running"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    self.transport.shutdown().await?;
                    return Ok(());
                }
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => dispatcher.begin_connection(conn),
                    Err(TransportError::Shutdown) => return Ok(()),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
            }
        }
    }
}
