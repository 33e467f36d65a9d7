//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (binary)
//!     → validation.rs (semantic checks for the selected program)
//!     → ToolkitConfig (validated, immutable)
//!     → per-worker configuration shared via Arc
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    LifecycleConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, ServerConfig, ToolkitConfig,
    DEFAULT_PROXY_PORT, DEFAULT_SERVER_PORT,
};
