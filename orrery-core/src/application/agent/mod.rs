//! # Agent Module
//!
//! One autonomous agent: its conversation with the model, its inbox and
//! to-do queues, its tool preferences and its processing status.
//!
//! ## Key Types
//!
//! - [`Agent`] - orchestrates inbox/to-do processing over a filtered tool view
//! - [`ConversationManager`] - owns history and runs completion cycles
//! - [`AgentRecord`] - serialized agent state
//! - [`AgentError`] - failures of a conversation cycle

mod conversation;
mod errors;
mod orchestrator;
mod record;
mod state;
pub mod transcript;

pub use conversation::{CompletionTarget, ConversationManager, ToolDispatcher};
pub use errors::{AgentError, PersistError};
pub use orchestrator::{Agent, AgentEvent, ThinkReport};
pub use record::AgentRecord;
pub use state::{AgentState, ToolPreferences};
