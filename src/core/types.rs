//! Core type definitions used throughout Magic Eye.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Content facts gathered for a file that was read successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Leading bytes of the file, in order
    pub magic_bytes: Vec<u8>,
    /// MIME type derived from content
    pub mime_type: String,
    /// Human-readable type description
    pub description: String,
    /// Canonical extension implied by the MIME type, or `bin`
    pub true_extension: String,
    /// Lowercase extension taken from the file name, empty when absent
    pub current_extension: String,
    /// Last modification time, if the platform reports one
    pub modified: Option<DateTime<Utc>>,
}

/// The outcome of analysing one file.
///
/// A record is produced once per analysed file and handed by value to the
/// detection callback. Fields are read-only; an `error` record never carries
/// content and is never suspicious.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRecord {
    file_path: PathBuf,
    file_name: String,
    #[serde(flatten)]
    content: Option<ContentInfo>,
    is_suspicious: bool,
    error: Option<String>,
    detected_at: DateTime<Utc>,
}

impl DetectionRecord {
    /// Build a record for a file whose content was sniffed.
    pub fn analyzed(file_path: PathBuf, content: ContentInfo, is_suspicious: bool) -> Self {
        let file_name = file_name_of(&file_path);
        Self {
            file_path,
            file_name,
            content: Some(content),
            is_suspicious,
            error: None,
            detected_at: Utc::now(),
        }
    }

    /// Build a record for a file that could not be analysed.
    pub fn failed(file_path: PathBuf, error: impl Into<String>) -> Self {
        let file_name = file_name_of(&file_path);
        Self {
            file_path,
            file_name,
            content: None,
            is_suspicious: false,
            error: Some(error.into()),
            detected_at: Utc::now(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Sniffed content facts; `None` for error records.
    pub fn content(&self) -> Option<&ContentInfo> {
        self.content.as_ref()
    }

    pub fn is_suspicious(&self) -> bool {
        self.is_suspicious
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub fn file_size_bytes(&self) -> Option<u64> {
        self.content.as_ref().map(|c| c.file_size_bytes)
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.mime_type.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.description.as_str())
    }

    pub fn true_extension(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.true_extension.as_str())
    }

    pub fn current_extension(&self) -> Option<&str> {
        self.content.as_ref().map(|c| c.current_extension.as_str())
    }

    /// Current extension for display, with `(none)` standing in for an empty one.
    pub fn current_extension_display(&self) -> Option<&str> {
        self.current_extension()
            .map(|ext| if ext.is_empty() { "(none)" } else { ext })
    }

    /// Compare two records ignoring the detection timestamp.
    pub fn same_outcome(&self, other: &Self) -> bool {
        self.file_path == other.file_path
            && self.file_name == other.file_name
            && self.content == other.content
            && self.is_suspicious == other.is_suspicious
            && self.error == other.error
    }
}

impl std::fmt::Display for DetectionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(err) = &self.error {
            return write!(f, "[ERROR] {}: {}", self.file_name, err);
        }
        let verdict = if self.is_suspicious { "SUSPICIOUS" } else { "SAFE" };
        match &self.content {
            Some(c) => write!(
                f,
                "[{}] {} (.{} claimed, .{} detected: {})",
                verdict,
                self.file_name,
                self.current_extension_display().unwrap_or_default(),
                c.true_extension,
                c.description
            ),
            None => write!(f, "[{}] {}", verdict, self.file_name),
        }
    }
}

/// A configured directory to watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    /// Directory path
    pub path: PathBuf,
    /// Whether subdirectories are watched (always false for now)
    pub recursive: bool,
    /// Whether the directory existed when last checked
    pub exists: bool,
}

impl WatchTarget {
    /// Create a non-recursive target and check whether the directory exists.
    pub fn resolve(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let exists = path.is_dir();
        Self {
            path,
            recursive: false,
            exists,
        }
    }
}

/// Filename suffixes that are dropped before any analysis.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IgnorePolicy {
    suffixes: Vec<String>,
}

impl IgnorePolicy {
    /// Build a policy from suffixes such as `.tmp` or `part`.
    ///
    /// Entries are lowercased and given a leading dot if they lack one.
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = suffixes
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty() && s != ".")
            .map(|s| if s.starts_with('.') { s } else { format!(".{}", s) })
            .collect();
        Self { suffixes }
    }

    /// Check whether a path's file name ends with an ignored suffix.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.suffixes.iter().any(|suffix| name.ends_with(suffix.as_str()))
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}

/// Lifecycle state of the directory watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for WatcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatcherState::Stopped => write!(f, "stopped"),
            WatcherState::Starting => write!(f, "starting"),
            WatcherState::Running => write!(f, "running"),
            WatcherState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Lowercase extension of a file name, or an empty string when it has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(current: &str, true_ext: &str) -> ContentInfo {
        ContentInfo {
            file_size_bytes: 4,
            magic_bytes: vec![0x25, 0x50, 0x44, 0x46],
            mime_type: "application/pdf".to_string(),
            description: "PDF document".to_string(),
            true_extension: true_ext.to_string(),
            current_extension: current.to_string(),
            modified: None,
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/a/report.PDF")), "pdf");
        assert_eq!(extension_of(Path::new("/a/archive")), "");
        assert_eq!(extension_of(Path::new("/a/.bashrc")), "");
        assert_eq!(extension_of(Path::new("/a/photo.jpg.part")), "part");
    }

    #[test]
    fn test_failed_record_is_never_suspicious() {
        let record = DetectionRecord::failed(PathBuf::from("/tmp/x.pdf"), "gone");
        assert!(!record.is_suspicious());
        assert_eq!(record.error(), Some("gone"));
        assert!(record.content().is_none());
        assert_eq!(record.file_name(), "x.pdf");
    }

    #[test]
    fn test_display_extension_sentinel() {
        let record =
            DetectionRecord::analyzed(PathBuf::from("/d/archive"), content("", "zip"), false);
        assert_eq!(record.current_extension(), Some(""));
        assert_eq!(record.current_extension_display(), Some("(none)"));
        assert!(record.to_string().contains("(none)"));
    }

    #[test]
    fn test_record_json_shape() {
        let record =
            DetectionRecord::analyzed(PathBuf::from("/d/report.pdf"), content("pdf", "pdf"), false);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["file_name"], "report.pdf");
        assert_eq!(json["true_extension"], "pdf");
        assert_eq!(json["is_suspicious"], false);
    }

    #[test]
    fn test_ignore_policy_normalizes() {
        let policy = IgnorePolicy::new([".TMP", "part", "", ".crdownload"]);
        assert_eq!(policy.suffixes(), &[".tmp", ".part", ".crdownload"]);
        assert!(policy.is_ignored(Path::new("/d/photo.jpg.part")));
        assert!(policy.is_ignored(Path::new("/d/download.CRDOWNLOAD")));
        assert!(!policy.is_ignored(Path::new("/d/counterpart")));
        assert!(!policy.is_ignored(Path::new("/d/report.pdf")));
    }

    #[test]
    fn test_watch_target_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let target = WatchTarget::resolve(dir.path());
        assert!(target.exists);
        assert!(!target.recursive);

        let missing = WatchTarget::resolve(dir.path().join("missing"));
        assert!(!missing.exists);
    }
}
