pub mod agent;
pub mod status;
pub mod sync;
pub mod tooling;
