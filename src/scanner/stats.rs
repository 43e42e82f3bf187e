//! Live counters for a running watcher.

use crate::core::types::DetectionRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Point-in-time copy of the watcher counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Files analysed (including error records)
    pub files_analyzed: u64,
    /// Suspicious records produced
    pub threats_found: u64,
    /// Error records produced
    pub errors: u64,
    /// Events dropped by the ignore list
    pub ignored: u64,
    /// Callback invocations that panicked
    pub callback_failures: u64,
    /// When the last record was produced
    pub last_detection: Option<DateTime<Utc>>,
}

/// Thread-safe watcher counters.
#[derive(Debug, Default)]
pub struct WatchStats {
    files_analyzed: AtomicU64,
    threats_found: AtomicU64,
    errors: AtomicU64,
    ignored: AtomicU64,
    callback_failures: AtomicU64,
    last_detection: RwLock<Option<DateTime<Utc>>>,
}

impl WatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a produced record.
    pub fn record(&self, record: &DetectionRecord) {
        self.files_analyzed.fetch_add(1, Ordering::Relaxed);
        if record.error().is_some() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        } else if record.is_suspicious() {
            self.threats_found.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut last) = self.last_detection.write() {
            *last = Some(record.detected_at());
        }
    }

    pub fn increment_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_callback_failures(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_analyzed: self.files_analyzed.load(Ordering::Relaxed),
            threats_found: self.threats_found.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            last_detection: self.last_detection.read().map(|l| *l).unwrap_or(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ContentInfo;
    use std::path::PathBuf;

    fn analyzed(suspicious: bool) -> DetectionRecord {
        let content = ContentInfo {
            file_size_bytes: 2,
            magic_bytes: b"MZ".to_vec(),
            mime_type: "application/x-msdownload".to_string(),
            description: "MS-DOS/Windows executable".to_string(),
            true_extension: "exe".to_string(),
            current_extension: if suspicious { "pdf" } else { "exe" }.to_string(),
            modified: None,
        };
        DetectionRecord::analyzed(PathBuf::from("/d/f"), content, suspicious)
    }

    #[test]
    fn test_stats_counting() {
        let stats = WatchStats::new();
        stats.record(&analyzed(true));
        stats.record(&analyzed(false));
        stats.record(&DetectionRecord::failed(PathBuf::from("/d/x"), "gone"));
        stats.increment_ignored();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.files_analyzed, 3);
        assert_eq!(snapshot.threats_found, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.ignored, 1);
        assert!(snapshot.last_detection.is_some());
    }
}
