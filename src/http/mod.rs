//! HTTP subset: one request per connection.
//!
//! # Data Flow
//! ```text
//! accepted connection
//!     → header.rs (frame start line and fields, 2s read bound)
//!     → server.rs (method check, directory lookup)
//!     → response.rs (status line, fixed fields, body)
//!     → close
//! ```
//!
//! No chunked encoding, keep-alive, pipelining, or TLS.

pub mod header;
pub mod response;
pub mod server;

pub use header::{FramingError, HeaderError, HeaderFields, HeaderParser};
pub use response::{reason_phrase, ResponseHead};
pub use server::{OriginWorker, HEADER_READ_TIMEOUT};
