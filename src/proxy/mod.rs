//! Transparent TCP proxy.
//!
//! # Data Flow
//! ```text
//! accepted client connection
//!     → worker.rs (open upstream, or log and close)
//!     → relay.rs (RelayPair: join both directions, log each, close both)
//!     → forward.rs (ForwardTask per direction → RelayResult)
//! ```
//!
//! Bytes are relayed without interpretation. No timeout applies to either
//! direction; an idle pair stays open until one side closes.

pub mod forward;
pub mod relay;
pub mod worker;

pub use forward::{forward, Direction, ForwardTask, RelayResult};
pub use relay::{RelayError, RelayPair, Upstream};
pub use worker::{ProxyWorker, ProxyWorkerConfig};
