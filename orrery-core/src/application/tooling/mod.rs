//! Tool-server integration: transports, discovery and the shared catalog.

mod connection;
mod discovery;
mod error;
mod interface;
mod manager;
#[cfg(feature = "native-transport")]
mod process;
mod protocol;
mod registry;
mod transport;

pub use connection::{ConnectionState, ServerStatus};
pub use discovery::{DiscoverySummary, ServerFailure};
pub use error::{ToolError, ToolInvokeError};
pub use interface::{ToolServerInterface, ensure_success};
pub use manager::ServerManager;
#[cfg(feature = "native-transport")]
pub use process::McpProcess;
pub use registry::{ServerCatalog, ToolRegistry};
#[cfg(feature = "native-transport")]
pub use transport::ProcessTransportFactory;
pub use transport::{Handshake, ServerTransport, TransportFactory};
