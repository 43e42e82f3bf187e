//! File type detection using magic bytes and structural checks.
//!
//! Detection looks only at content. The file name is never consulted here,
//! so a renamed executable is still reported as an executable.

/// Bytes read from the start of a file for structural sniffing.
pub const SNIFF_WINDOW: usize = 8192;

/// Extension reported when a MIME type has no entry in [`MIME_EXTENSIONS`].
pub const UNKNOWN_EXTENSION: &str = "bin";

/// Canonical extension for each known MIME type.
pub const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("application/x-rar-compressed", "rar"),
    ("application/x-7z-compressed", "7z"),
    ("application/x-msdownload", "exe"),
    ("application/x-msdos-program", "exe"),
    ("application/x-elf", "elf"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/bmp", "bmp"),
    ("audio/mpeg", "mp3"),
    ("audio/mp4", "m4a"),
    ("video/mp4", "mp4"),
    ("video/x-msvideo", "avi"),
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("application/json", "json"),
    ("application/xml", "xml"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
];

/// Map a MIME type to its canonical extension, falling back to `bin`.
pub fn canonical_extension(mime: &str) -> &'static str {
    let mime = mime.trim();
    MIME_EXTENSIONS
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
        .unwrap_or(UNKNOWN_EXTENSION)
}

/// Detected file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// PDF document
    Pdf,
    /// ZIP archive
    Zip,
    /// RAR archive
    Rar,
    /// 7-Zip archive
    SevenZip,
    /// Windows / DOS executable (MZ header)
    Executable,
    /// ELF binary
    Elf,
    /// JPEG image
    Jpeg,
    /// PNG image
    Png,
    /// GIF image
    Gif,
    /// Windows bitmap
    Bmp,
    /// MPEG audio
    Mp3,
    /// MPEG-4 audio
    M4a,
    /// MPEG-4 video
    Mp4,
    /// AVI video
    Avi,
    /// Plain text
    Text,
    /// HTML document
    Html,
    /// JSON document
    Json,
    /// XML document
    Xml,
    /// Legacy Office document (OLE compound file)
    Doc,
    /// Word document (Office Open XML)
    Docx,
    /// GZIP compressed
    Gzip,
    /// Mach-O binary
    MachO,
    /// Java class file
    JavaClass,
    /// WAVE audio
    Wav,
    /// WebP image
    Webp,
    /// Ogg container
    Ogg,
    /// TIFF image
    Tiff,
    /// Windows icon
    Ico,
    /// QuickTime movie
    QuickTime,
    /// Script with an interpreter line
    Script,
    /// Zero-length file
    Empty,
    /// Binary data (unknown format)
    Binary,
}

impl FileType {
    /// Get MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Zip => "application/zip",
            FileType::Rar => "application/x-rar-compressed",
            FileType::SevenZip => "application/x-7z-compressed",
            FileType::Executable => "application/x-msdownload",
            FileType::Elf => "application/x-elf",
            FileType::Jpeg => "image/jpeg",
            FileType::Png => "image/png",
            FileType::Gif => "image/gif",
            FileType::Bmp => "image/bmp",
            FileType::Mp3 => "audio/mpeg",
            FileType::M4a => "audio/mp4",
            FileType::Mp4 => "video/mp4",
            FileType::Avi => "video/x-msvideo",
            FileType::Text => "text/plain",
            FileType::Html => "text/html",
            FileType::Json => "application/json",
            FileType::Xml => "application/xml",
            FileType::Doc => "application/msword",
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileType::Gzip => "application/gzip",
            FileType::MachO => "application/x-mach-binary",
            FileType::JavaClass => "application/x-java-applet",
            FileType::Wav => "audio/x-wav",
            FileType::Webp => "image/webp",
            FileType::Ogg => "audio/ogg",
            FileType::Tiff => "image/tiff",
            FileType::Ico => "image/vnd.microsoft.icon",
            FileType::QuickTime => "video/quicktime",
            FileType::Script => "text/x-script",
            FileType::Empty => "inode/x-empty",
            FileType::Binary => "application/octet-stream",
        }
    }

    /// Canonical extension for this type (`bin` for unmapped types).
    pub fn extension(&self) -> &'static str {
        canonical_extension(self.mime_type())
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileType::Pdf => write!(f, "PDF document"),
            FileType::Zip => write!(f, "Zip archive data"),
            FileType::Rar => write!(f, "RAR archive data"),
            FileType::SevenZip => write!(f, "7-zip archive data"),
            FileType::Executable => write!(f, "MS-DOS/Windows executable"),
            FileType::Elf => write!(f, "ELF executable"),
            FileType::Jpeg => write!(f, "JPEG image data"),
            FileType::Png => write!(f, "PNG image data"),
            FileType::Gif => write!(f, "GIF image data"),
            FileType::Bmp => write!(f, "PC bitmap"),
            FileType::Mp3 => write!(f, "MPEG audio"),
            FileType::M4a => write!(f, "ISO Media, MPEG-4 audio"),
            FileType::Mp4 => write!(f, "ISO Media, MPEG-4 video"),
            FileType::Avi => write!(f, "RIFF data, AVI video"),
            FileType::Text => write!(f, "text"),
            FileType::Html => write!(f, "HTML document"),
            FileType::Json => write!(f, "JSON data"),
            FileType::Xml => write!(f, "XML document"),
            FileType::Doc => write!(f, "Composite Document File V2 Document"),
            FileType::Docx => write!(f, "Microsoft Word 2007+"),
            FileType::Gzip => write!(f, "gzip compressed data"),
            FileType::MachO => write!(f, "Mach-O binary"),
            FileType::JavaClass => write!(f, "compiled Java class data"),
            FileType::Wav => write!(f, "RIFF data, WAVE audio"),
            FileType::Webp => write!(f, "RIFF data, Web/P image"),
            FileType::Ogg => write!(f, "Ogg data"),
            FileType::Tiff => write!(f, "TIFF image data"),
            FileType::Ico => write!(f, "MS Windows icon resource"),
            FileType::QuickTime => write!(f, "ISO Media, Apple QuickTime movie"),
            FileType::Script => write!(f, "script text executable"),
            FileType::Empty => write!(f, "empty"),
            FileType::Binary => write!(f, "data"),
        }
    }
}

/// File type detector using magic bytes.
pub struct FileTypeDetector;

impl FileTypeDetector {
    /// Detect file type from leading bytes.
    ///
    /// `complete` is true when `bytes` holds the entire file; whole-document
    /// checks (JSON parsing) only run in that case.
    pub fn detect(bytes: &[u8], complete: bool) -> FileType {
        if bytes.is_empty() {
            return if complete {
                FileType::Empty
            } else {
                FileType::Binary
            };
        }

        if let Some(file_type) = Self::detect_binary(bytes) {
            return file_type;
        }

        if Self::is_likely_text(bytes) {
            return Self::detect_text(bytes, complete);
        }

        FileType::Binary
    }

    /// Describe the detected type, adding details read from the header.
    pub fn describe(file_type: FileType, bytes: &[u8]) -> String {
        match file_type {
            FileType::Pdf => match Self::pdf_version(bytes) {
                Some(version) => format!("PDF document, version {}", version),
                None => file_type.to_string(),
            },
            FileType::Png if bytes.len() >= 24 => {
                let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
                let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
                format!("PNG image data, {} x {}", width, height)
            }
            FileType::Gif => match bytes.get(3..6) {
                Some(version) => {
                    format!("GIF image data, version {}", String::from_utf8_lossy(version))
                }
                None => file_type.to_string(),
            },
            FileType::Elf if bytes.len() >= 5 => {
                let class = match bytes[4] {
                    1 => "32-bit",
                    2 => "64-bit",
                    _ => "unknown-class",
                };
                format!("ELF {} executable", class)
            }
            FileType::Text | FileType::Script => {
                let encoding = Self::text_encoding(bytes);
                if file_type == FileType::Script {
                    format!("script, {} text executable", encoding)
                } else {
                    format!("{} text", encoding)
                }
            }
            _ => file_type.to_string(),
        }
    }

    /// Formats recognised by fixed signatures.
    fn detect_binary(bytes: &[u8]) -> Option<FileType> {
        // PE / DOS executable
        if bytes.starts_with(b"MZ") {
            return Some(FileType::Executable);
        }

        if bytes.starts_with(b"\x7fELF") {
            return Some(FileType::Elf);
        }

        if bytes.len() >= 4 {
            let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if matches!(magic, 0xFEEDFACE | 0xFEEDFACF | 0xCEFAEDFE | 0xCFFAEDFE) {
                return Some(FileType::MachO);
            }
            // Universal binaries and Java classes share CAFEBABE; a fat header
            // holds a small architecture count where a class holds its version.
            if magic == 0xCAFEBABE && bytes.len() >= 8 {
                let next = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
                return Some(if next < 20 {
                    FileType::MachO
                } else {
                    FileType::JavaClass
                });
            }
        }

        if bytes.starts_with(b"PK\x03\x04") {
            return Some(if Self::is_word_document(bytes) {
                FileType::Docx
            } else {
                FileType::Zip
            });
        }
        if bytes.starts_with(b"PK\x05\x06") || bytes.starts_with(b"PK\x07\x08") {
            return Some(FileType::Zip);
        }

        if bytes.starts_with(b"Rar!\x1a\x07") {
            return Some(FileType::Rar);
        }

        if bytes.starts_with(b"7z\xbc\xaf\x27\x1c") {
            return Some(FileType::SevenZip);
        }

        if bytes.starts_with(b"\x1f\x8b") {
            return Some(FileType::Gzip);
        }

        if bytes.starts_with(b"%PDF-") {
            return Some(FileType::Pdf);
        }

        // OLE compound document
        if bytes.starts_with(b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1") {
            return Some(FileType::Doc);
        }

        if bytes.starts_with(b"\xff\xd8\xff") {
            return Some(FileType::Jpeg);
        }

        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(FileType::Png);
        }

        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(FileType::Gif);
        }

        // BMP: "BM", file size, then two reserved zero words
        if bytes.len() >= 14 && bytes.starts_with(b"BM") && bytes[6..10] == [0, 0, 0, 0] {
            return Some(FileType::Bmp);
        }

        if bytes.starts_with(b"ID3") {
            return Some(FileType::Mp3);
        }
        // MPEG audio frame sync (layer III)
        if bytes.len() >= 2 && bytes[0] == 0xff && matches!(bytes[1], 0xfb | 0xfa | 0xf3 | 0xf2) {
            return Some(FileType::Mp3);
        }

        if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
            return Some(match &bytes[8..12] {
                b"M4A " | b"M4B " | b"M4P " => FileType::M4a,
                b"qt  " => FileType::QuickTime,
                _ => FileType::Mp4,
            });
        }

        if bytes.len() >= 12 && bytes.starts_with(b"RIFF") {
            match &bytes[8..12] {
                b"AVI " => return Some(FileType::Avi),
                b"WAVE" => return Some(FileType::Wav),
                b"WEBP" => return Some(FileType::Webp),
                _ => {}
            }
        }

        if bytes.starts_with(b"OggS") {
            return Some(FileType::Ogg);
        }

        if bytes.starts_with(b"II*\x00") || bytes.starts_with(b"MM\x00*") {
            return Some(FileType::Tiff);
        }

        if bytes.len() >= 6 && bytes.starts_with(b"\x00\x00\x01\x00") && bytes[4] > 0 {
            return Some(FileType::Ico);
        }

        None
    }

    /// Classify content already known to be text.
    fn detect_text(bytes: &[u8], complete: bool) -> FileType {
        let body = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
        let trimmed = body.trim_ascii_start();

        if trimmed.starts_with(b"#!") {
            return FileType::Script;
        }

        if trimmed.starts_with(b"<?xml") {
            return FileType::Xml;
        }

        if Self::looks_like_html(trimmed) {
            return FileType::Html;
        }

        if complete
            && matches!(trimmed.first(), Some(b'{') | Some(b'['))
            && serde_json::from_slice::<serde_json::Value>(body).is_ok()
        {
            return FileType::Json;
        }

        FileType::Text
    }

    /// A ZIP whose first entries are Word parts.
    fn is_word_document(bytes: &[u8]) -> bool {
        let has = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
        has(b"word/") || (has(b"[Content_Types].xml") && has(b"word"))
    }

    /// Check if bytes look like HTML.
    fn looks_like_html(bytes: &[u8]) -> bool {
        let head = &bytes[..bytes.len().min(512)];
        let lower = String::from_utf8_lossy(head).to_lowercase();
        lower.starts_with("<!doctype html")
            || lower.contains("<html")
            || lower.contains("<head")
            || lower.contains("<body")
    }

    /// Check if bytes are likely text (not binary).
    fn is_likely_text(bytes: &[u8]) -> bool {
        if bytes.is_empty() || bytes.contains(&0) {
            return false;
        }

        let non_text_count = bytes
            .iter()
            .filter(|&&b| {
                !(b == 9 || b == 10 || b == 12 || b == 13 || (32..=126).contains(&b) || b >= 128)
            })
            .count();

        // More than 10% control characters means binary
        (non_text_count as f64 / bytes.len() as f64) < 0.1
    }

    fn text_encoding(bytes: &[u8]) -> &'static str {
        if bytes.is_ascii() {
            return "ASCII";
        }
        match std::str::from_utf8(bytes) {
            Ok(_) => "Unicode UTF-8",
            // A multi-byte sequence cut off by the sniff window is still UTF-8
            Err(e) if e.error_len().is_none() => "Unicode UTF-8",
            Err(_) => "ISO-8859",
        }
    }

    fn pdf_version(bytes: &[u8]) -> Option<String> {
        let rest = bytes.strip_prefix(b"%PDF-")?;
        let version: String = rest
            .iter()
            .take_while(|b| b.is_ascii_digit() || **b == b'.')
            .map(|&b| b as char)
            .collect();
        (!version.is_empty()).then_some(version)
    }
}
