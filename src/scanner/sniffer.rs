//! Content sniffing: turns a path into a [`DetectionRecord`].
//!
//! The sniffer reads file metadata and a bounded leading window, asks a
//! [`SniffBackend`] what the bytes are, maps the answer to a canonical
//! extension and runs the [`MismatchClassifier`]. It never writes to or
//! moves the file.

use crate::core::config::{WatchConfig, DEFAULT_SAMPLE_SIZE};
use crate::core::error::{Error, Result};
use crate::core::types::{extension_of, ContentInfo, DetectionRecord};
use crate::scanner::classifier::MismatchClassifier;
use crate::scanner::filetype::{canonical_extension, FileTypeDetector, SNIFF_WINDOW};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufReader, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

/// What a backend reports about a byte window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sniffed {
    /// MIME type derived from content
    pub mime_type: String,
    /// Human-readable description
    pub description: String,
}

/// A content-identification backend.
///
/// Implementations must decide from `head` alone; `complete` tells them
/// whether `head` is the whole file.
pub trait SniffBackend: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Identify the content of `head`.
    fn sniff(&self, head: &[u8], complete: bool) -> Result<Sniffed>;
}

/// Built-in backend driven by the magic-byte table.
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicTableBackend;

impl SniffBackend for MagicTableBackend {
    fn name(&self) -> &str {
        "magic-table"
    }

    fn sniff(&self, head: &[u8], complete: bool) -> Result<Sniffed> {
        let file_type = FileTypeDetector::detect(head, complete);
        Ok(Sniffed {
            mime_type: file_type.mime_type().to_string(),
            description: FileTypeDetector::describe(file_type, head),
        })
    }
}

/// Analyses files and produces detection records.
#[derive(Clone)]
pub struct ContentSniffer {
    backend: Arc<dyn SniffBackend>,
    classifier: MismatchClassifier,
    sample_size: usize,
}

impl Default for ContentSniffer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}

impl std::fmt::Debug for ContentSniffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSniffer")
            .field("backend", &self.backend.name())
            .field("sample_size", &self.sample_size)
            .finish()
    }
}

impl ContentSniffer {
    /// Create a sniffer using the built-in magic table.
    pub fn new(sample_size: usize) -> Self {
        Self::with_backend(Arc::new(MagicTableBackend), sample_size)
    }

    /// Create a sniffer from watch configuration.
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.sample_size)
    }

    /// Create a sniffer with a custom backend.
    pub fn with_backend(backend: Arc<dyn SniffBackend>, sample_size: usize) -> Self {
        Self {
            backend,
            classifier: MismatchClassifier::default(),
            sample_size: sample_size.max(1),
        }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Analyse a file. Failures become an error record, never a panic or `Err`.
    ///
    /// The record carries the absolute form of `path`.
    pub fn analyze(&self, path: &Path) -> DetectionRecord {
        let file_path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        match self.inspect(&file_path) {
            Ok(content) => {
                let suspicious = self
                    .classifier
                    .is_suspicious(&content.true_extension, &content.current_extension);
                DetectionRecord::analyzed(file_path, content, suspicious)
            }
            Err(e) => {
                log::debug!("Analysis of {:?} failed [{}]: {}", file_path, e.category(), e);
                DetectionRecord::failed(file_path, e.to_string())
            }
        }
    }

    /// Gather content facts for a file.
    pub fn inspect(&self, path: &Path) -> Result<ContentInfo> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::file_read(path, e))?;
        if !metadata.is_file() {
            return Err(Error::sniff(path, "not a regular file"));
        }

        let window = SNIFF_WINDOW.max(self.sample_size);
        let head = read_head(path, window)?;
        let complete = head.len() < window;

        let sniffed = self.sniff_guarded(path, &head, complete)?;
        let true_extension = canonical_extension(&sniffed.mime_type).to_string();

        Ok(ContentInfo {
            file_size_bytes: metadata.len(),
            magic_bytes: head[..head.len().min(self.sample_size)].to_vec(),
            mime_type: sniffed.mime_type,
            description: sniffed.description,
            true_extension,
            current_extension: extension_of(path),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    /// Run the backend, turning a panic into a sniffing error.
    fn sniff_guarded(&self, path: &Path, head: &[u8], complete: bool) -> Result<Sniffed> {
        let backend = &self.backend;
        match panic::catch_unwind(AssertUnwindSafe(|| backend.sniff(head, complete))) {
            Ok(result) => result,
            Err(_) => Err(Error::sniff(
                path,
                format!("{} backend panicked", backend.name()),
            )),
        }
    }
}

/// Read at most `limit` bytes from the start of a file.
fn read_head(path: &Path, limit: usize) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
    let mut reader = BufReader::new(file).take(limit as u64);
    let mut buffer = Vec::with_capacity(limit.min(SNIFF_WINDOW));
    reader
        .read_to_end(&mut buffer)
        .map_err(|e| Error::file_read(path, e))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_genuine_pdf_is_safe() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "report.pdf", b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n");

        let record = ContentSniffer::default().analyze(&path);
        assert_eq!(record.true_extension(), Some("pdf"));
        assert_eq!(record.current_extension(), Some("pdf"));
        assert_eq!(record.mime_type(), Some("application/pdf"));
        assert!(!record.is_suspicious());
        assert!(record.error().is_none());
    }

    #[test]
    fn test_executable_disguised_as_pdf() {
        let dir = tempdir().unwrap();
        let mut bytes = b"MZ\x90\x00\x03\x00\x00\x00\x04\x00\x00\x00\xff\xff\x00\x00".to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let path = write(dir.path(), "invoice.pdf", &bytes);

        let record = ContentSniffer::default().analyze(&path);
        assert_eq!(record.true_extension(), Some("exe"));
        assert_eq!(record.current_extension(), Some("pdf"));
        assert!(record.is_suspicious());
    }

    #[test]
    fn test_zip_without_extension() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "archive", b"PK\x03\x04\x14\x00\x00\x00\x08\x00");

        let record = ContentSniffer::default().analyze(&path);
        assert_eq!(record.true_extension(), Some("zip"));
        assert_eq!(record.current_extension(), Some(""));
        assert!(!record.is_suspicious());
    }

    #[test]
    fn test_unmapped_content_named_bin() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "data.bin", &[0x00, 0x13, 0x37, 0x00, 0xaa, 0x01, 0x02, 0x03]);

        let record = ContentSniffer::default().analyze(&path);
        assert_eq!(record.true_extension(), Some("bin"));
        assert_eq!(record.current_extension(), Some("bin"));
        assert!(!record.is_suspicious());
    }

    #[test]
    fn test_unknown_content_named_jpg_is_suspicious() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "photo.jpg", &[0x00, 0x01, 0x02, 0x03, 0x00, 0x05]);

        let record = ContentSniffer::default().analyze(&path);
        assert_eq!(record.true_extension(), Some("bin"));
        assert!(record.is_suspicious());
    }

    #[test]
    fn test_magic_bytes_sample() {
        let dir = tempdir().unwrap();
        let content: Vec<u8> = (0u8..64).collect();
        let path = write(dir.path(), "counting.dat", &content);

        let record = ContentSniffer::default().analyze(&path);
        let info = record.content().unwrap();
        assert_eq!(info.magic_bytes, (0u8..16).collect::<Vec<_>>());
        assert_eq!(info.file_size_bytes, 64);

        let record = ContentSniffer::new(4).analyze(&path);
        assert_eq!(record.content().unwrap().magic_bytes, vec![0, 1, 2, 3]);

        let short = write(dir.path(), "short.txt", b"hi");
        let record = ContentSniffer::default().analyze(&short);
        assert_eq!(record.content().unwrap().magic_bytes, b"hi".to_vec());
    }

    #[test]
    fn test_missing_file_yields_error_record() {
        let dir = tempdir().unwrap();
        let record = ContentSniffer::default().analyze(&dir.path().join("vanished.exe"));
        assert!(record.error().is_some());
        assert!(!record.is_suspicious());
        assert!(record.content().is_none());
        assert_eq!(record.file_name(), "vanished.exe");
    }

    #[test]
    fn test_directory_yields_error_record() {
        let dir = tempdir().unwrap();
        let record = ContentSniffer::default().analyze(dir.path());
        assert!(record.error().is_some());
        assert!(!record.is_suspicious());
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "notes.txt", b"plain text notes\n");
        let sniffer = ContentSniffer::default();

        let first = sniffer.analyze(&path);
        let second = sniffer.analyze(&path);
        assert!(first.same_outcome(&second));
    }

    #[test]
    fn test_json_file_detected() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "settings.json", br#"{"enabled": true}"#);
        let record = ContentSniffer::default().analyze(&path);
        assert_eq!(record.true_extension(), Some("json"));
        assert!(!record.is_suspicious());
    }

    struct PanickingBackend;

    impl SniffBackend for PanickingBackend {
        fn name(&self) -> &str {
            "panicking"
        }

        fn sniff(&self, _head: &[u8], _complete: bool) -> Result<Sniffed> {
            panic!("backend exploded");
        }
    }

    struct FixedBackend(&'static str);

    impl SniffBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn sniff(&self, _head: &[u8], _complete: bool) -> Result<Sniffed> {
            Ok(Sniffed {
                mime_type: self.0.to_string(),
                description: "fixed".to_string(),
            })
        }
    }

    #[test]
    fn test_backend_panic_becomes_error_record() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "a.txt", b"hello");
        let sniffer = ContentSniffer::with_backend(Arc::new(PanickingBackend), 16);

        let record = sniffer.analyze(&path);
        assert!(record.error().unwrap().contains("panicked"));
        assert!(!record.is_suspicious());
    }

    #[test]
    fn test_custom_backend_mime_mapping() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "song.mp3", b"whatever");

        let sniffer = ContentSniffer::with_backend(Arc::new(FixedBackend("audio/mpeg")), 16);
        assert!(!sniffer.analyze(&path).is_suspicious());

        let sniffer = ContentSniffer::with_backend(Arc::new(FixedBackend("application/x-foo")), 16);
        let record = sniffer.analyze(&path);
        assert_eq!(record.true_extension(), Some("bin"));
        assert!(record.is_suspicious());
    }

    struct RefusingBackend;

    impl SniffBackend for RefusingBackend {
        fn name(&self) -> &str {
            "refusing"
        }

        fn sniff(&self, _head: &[u8], _complete: bool) -> Result<Sniffed> {
            Err(Error::Internal("no magic database".to_string()))
        }
    }

    #[test]
    fn test_backend_error_becomes_error_record() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "photo.jpg", b"\xff\xd8\xff\xe0");
        let sniffer = ContentSniffer::with_backend(Arc::new(RefusingBackend), 16);

        let record = sniffer.analyze(&path);
        assert!(record.error().unwrap().contains("no magic database"));
        assert!(record.content().is_none());
        assert!(!record.is_suspicious());
    }

    #[test]
    fn test_relative_paths_are_recorded_absolute() {
        let sniffer = ContentSniffer::default();

        let record = sniffer.analyze(Path::new("Cargo.toml"));
        assert!(record.file_path().is_absolute());
        assert!(record.file_path().ends_with("Cargo.toml"));
        assert!(record.error().is_none());

        let missing = sniffer.analyze(Path::new("no-such-dir/missing.pdf"));
        assert!(missing.file_path().is_absolute());
        assert!(missing.file_path().ends_with("no-such-dir/missing.pdf"));
        assert!(missing.error().is_some());
    }
}
