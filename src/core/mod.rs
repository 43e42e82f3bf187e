//! Configuration, error handling and the shared record types.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, WatchConfig};
pub use error::{Error, ErrorCategory, Result};
pub use types::{ContentInfo, DetectionRecord, IgnorePolicy, WatchTarget, WatcherState};
