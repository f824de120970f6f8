//! Process entry point for Orrery.
//!
//! Owns the lifecycle of the shared [`ServerManager`]: it is built and
//! initialized here, handed to the agent and the sync engine, and closed
//! last.
//!
//! [`ServerManager`]: orrery_core::ServerManager

pub mod cli;
pub mod runtime;
pub mod stdio;

pub use runtime::{Session, run};
