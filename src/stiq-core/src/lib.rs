//! stiq Core Library
//!
//! Network-free building blocks for the stiq client:
//! - Connection options and output mode
//! - URL construction
//! - Request descriptors
//! - The command table and its resolution

pub mod commands;
pub mod config;
pub mod models;
pub mod url;

// Re-export commonly used types
pub use commands::{Command, CommandSpec, ResolveError, COMMANDS};
pub use config::{ConnectionOptions, OutputMode};
pub use models::*;
pub use url::full_url;
