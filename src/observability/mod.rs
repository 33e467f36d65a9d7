//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listeners and workers produce:
//!     → logging.rs (access and error records through LogSinks)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (access log), stderr (error log)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogSinks, ACCESS_TARGET, ERROR_TARGET};
