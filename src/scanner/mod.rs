//! Content identification and folder watching.
//!
//! This module provides:
//! - File type detection via magic bytes
//! - Mismatch classification between claimed and detected extensions
//! - Per-file content sniffing into detection records
//! - The directory watcher with its settle timers
//! - Session statistics

pub mod classifier;
pub mod filetype;
pub mod sniffer;
pub mod stats;
pub mod watcher;

pub use classifier::MismatchClassifier;
pub use filetype::{canonical_extension, FileType, FileTypeDetector};
pub use sniffer::{ContentSniffer, MagicTableBackend, SniffBackend, Sniffed};
pub use stats::{StatsSnapshot, WatchStats};
pub use watcher::{forward_to, DetectionCallback, DirectoryWatcher};
