pub mod content;
pub mod tool;
pub mod types;
