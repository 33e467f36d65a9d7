//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bounded accept loop)
//!     → connection.rs (id, live-connection tracking)
//!     → ConnectionWorker task (origin server or proxy)
//! ```
//!
//! # Design Decisions
//! - Bounded slot pool prevents resource exhaustion; slots are released on drop
//! - One task per connection; nothing mutable is shared between connections

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionListener, ConnectionPermit, ConnectionWorker, Listener, ListenerError};
