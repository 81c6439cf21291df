//! Command-line argument parsing and report rendering.

pub mod definition;
pub mod render;
pub mod utils;

// Re-export commonly used items
pub use definition::{Args, Command, RestoreFlags, parse};
pub use utils::determine_log_level;
