//! Small HTTP/FTP toolkit: a static-file origin server, a transparent TCP
//! proxy, and a fetch client.

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;

pub use config::schema::ToolkitConfig;
pub use http::OriginWorker;
pub use lifecycle::Shutdown;
pub use net::{ConnectionListener, ConnectionWorker, Listener};
pub use proxy::ProxyWorker;
