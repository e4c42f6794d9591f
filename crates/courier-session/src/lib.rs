//! Login sessions for Courier.
//!
//! The engine never checks passwords itself. It asks a [`SessionStore`],
//! which answers with a [`LoginStatus`]. Keeping this behind a trait lets
//! the server run against the in-memory store in production and a
//! scripted store in tests.
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)        ← calls login / logout / track_upload
//!     ↕
//! Session Layer (this crate)  ← who is logged in, on which connection
//!     ↕
//! Transport (below)     ← provides ConnectionId
//! ```

mod memory;
mod report;
mod store;

pub use memory::InMemorySessionStore;
pub use report::{SessionReport, UploadReport, UserReport};
pub use store::{LoginStatus, SessionStore};
