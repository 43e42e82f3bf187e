//! Utility functions and helpers.

pub mod format;
pub mod logging;

pub use format::{format_size, hex_dump};
pub use logging::{init_logging, LogConfig};
