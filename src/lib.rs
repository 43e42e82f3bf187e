//! Magic Eye: a folder watcher that flags files whose content does not match
//! their extension.
//!
//! Files appearing in the watched folders are identified by their leading
//! bytes, mapped to a canonical extension, and compared with the extension
//! they actually carry. Every analysis produces a [`DetectionRecord`] that is
//! handed to a caller-supplied callback.

pub mod core;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
pub use crate::scanner::{ContentSniffer, DirectoryWatcher, MismatchClassifier};
