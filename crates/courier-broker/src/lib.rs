//! Connection and topic registry for Courier.
//!
//! The [`Broker`] is the only state shared between connections. It knows
//! two things:
//!
//! - which connections exist, and the [`OutboundSender`] that reaches each
//!   one's writer;
//! - which connections subscribe to which topic, and under which
//!   subscription id.
//!
//! Every operation is synchronous. Delivery means pushing a [`Frame`]
//! onto the receiving connection's bounded outbound channel; the
//! dispatcher that owns the socket drains that channel and does the
//! actual write. A connection that lets its channel fill up is evicted.
//!
//! [`Frame`]: courier_protocol::Frame

mod registry;

pub use registry::{
    Broker, DEFAULT_OUTBOUND_CAPACITY, OutboundReceiver, OutboundSender,
    outbound_channel,
};
