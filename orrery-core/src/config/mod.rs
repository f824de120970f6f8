pub mod agent;
pub mod app;
pub mod error;
pub mod loader;
pub mod provider;
pub mod server;
pub mod sync;

pub use crate::constants::CONFIG_PATH;
pub use agent::AgentSettings;
pub use app::AppConfig;
pub use error::ConfigError;
pub use provider::{ModelInfo, ModelProviderConfig};
pub use server::{ServerConfig, validate_servers};
pub use sync::SyncConfig;
