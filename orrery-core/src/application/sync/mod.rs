//! Content sync: mirrors an agent's notepad, to-do list and inbox from a
//! tool server on a timer, retrying each kind with bounded backoff.

mod backoff;
mod engine;
mod parse;

pub use backoff::BackoffPolicy;
pub use engine::{ContentSyncEngine, SyncAttempt, SyncError, SyncPhase, SyncReport};
pub use parse::parse_content;
