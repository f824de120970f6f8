//! Model infrastructure module
//!
//! The completion boundary. Everything above it speaks [`ChatMessage`];
//! wire formats live only in the HTTP clients.
//!
//! # Structure
//! - `types` - Request, Response, Error types
//! - `traits` - ModelProvider, ModelClient traits
//! - `adapter` - Message and tool format adapters
//! - `factory` - Provider factory for creating clients
//! - `clients` - Individual client implementations
//! - `provider` - DynamicModelProvider for routing
//!
//! [`ChatMessage`]: crate::domain::types::ChatMessage

#[cfg(feature = "http-providers")]
pub mod adapter;
#[cfg(feature = "http-providers")]
pub mod clients;
#[cfg(feature = "http-providers")]
pub mod factory;
#[cfg(feature = "http-providers")]
pub mod provider;
pub mod traits;
pub mod types;

#[cfg(feature = "http-providers")]
pub use provider::DynamicModelProvider;
pub use traits::{ModelClient, ModelProvider};
pub use types::{ModelError, ModelRequest, ModelResponse};
