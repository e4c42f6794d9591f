//! # Courier
//!
//! A topic-based publish/subscribe message server speaking a STOMP-style
//! text protocol over TCP.
//!
//! Clients CONNECT with credentials, SUBSCRIBE to named topics, SEND
//! messages to topics they subscribe to, and receive every MESSAGE
//! published there. The server can schedule connections two ways, picked
//! at startup through [`ServerMode`]: one task per connection, or a small
//! pool of reactor workers multiplexing many sockets each.
//!
//! ## Layers
//!
//! ```text
//! courier-transport   TCP listener and connections
//! courier-protocol    frames and the NUL-delimited codec
//! courier-session     credential checks and login history
//! courier-broker      connection and topic registry, fan-out
//! courier (this)      per-connection engine, dispatchers, server
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::prelude::*;
//!
//! # async fn run() -> Result<(), CourierError> {
//! let server = CourierServer::builder()
//!     .bind("0.0.0.0:7777")
//!     .build(InMemorySessionStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod engine;
mod error;
mod handler;
pub mod observability;
mod reactor;
mod server;

pub use error::CourierError;
pub use server::{CourierServer, CourierServerBuilder, ServerConfig, ServerMode};

/// Everything needed to embed a server.
pub mod prelude {
    pub use crate::engine::{Action, EngineState, ProtocolEngine};
    pub use crate::{
        CourierError, CourierServer, CourierServerBuilder, ServerConfig,
        ServerMode,
    };
    pub use courier_broker::Broker;
    pub use courier_protocol::{Command, Frame, FrameDecoder, encode};
    pub use courier_session::{
        InMemorySessionStore, LoginStatus, SessionReport, SessionStore,
    };
    pub use courier_transport::ConnectionId;
}
