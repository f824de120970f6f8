//! Application constants
//!
//! Single source of truth for paths and other constants.

/// Default configuration file path
pub const CONFIG_PATH: &str = "config/orrery.toml";

/// Default environment file path
pub const ENV_PATH: &str = "config/.env";

/// MCP protocol revision announced during the `initialize` handshake
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";

/// Upper bound on completion rounds inside one conversation cycle
pub const DEFAULT_MAX_ROUNDS: usize = 8;

/// Seconds between two content sync ticks
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15;

/// First retry delay of a content sync attempt
pub const DEFAULT_SYNC_BASE_DELAY_MS: u64 = 1_000;

/// Total backoff budget of a content sync attempt
pub const DEFAULT_SYNC_CEILING_SECS: u64 = 30;
