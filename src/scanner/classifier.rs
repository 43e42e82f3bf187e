//! Extension/content mismatch classification.

/// Claimed extensions that are never reported, even when they disagree
/// with the content (in-progress download and scratch files).
pub const BENIGN_EXTENSIONS: &[&str] = &["tmp", "temp", "part"];

/// Decides whether a file's claimed extension contradicts its content.
#[derive(Debug, Clone)]
pub struct MismatchClassifier {
    benign: Vec<String>,
}

impl Default for MismatchClassifier {
    fn default() -> Self {
        Self::new(BENIGN_EXTENSIONS.iter().copied())
    }
}

impl MismatchClassifier {
    /// Create a classifier with a custom benign set.
    pub fn new<I, S>(benign: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let benign = benign
            .into_iter()
            .map(|s| s.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        Self { benign }
    }

    /// Return true when `current_extension` is a real claim that differs
    /// from `true_extension`.
    ///
    /// An empty claim is not suspicious. A `bin` true extension still takes
    /// part in the comparison, so unrecognised content under a known
    /// extension is reported.
    pub fn is_suspicious(&self, true_extension: &str, current_extension: &str) -> bool {
        let current = current_extension.trim_start_matches('.').to_lowercase();
        if current.is_empty() {
            return false;
        }
        if self.benign.iter().any(|b| *b == current) {
            return false;
        }
        current != true_extension.trim_start_matches('.').to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_extension_is_safe() {
        let classifier = MismatchClassifier::default();
        assert!(!classifier.is_suspicious("pdf", "pdf"));
        assert!(!classifier.is_suspicious("pdf", "PDF"));
        assert!(!classifier.is_suspicious("JPG", ".jpg"));
    }

    #[test]
    fn test_mismatch_is_suspicious() {
        let classifier = MismatchClassifier::default();
        assert!(classifier.is_suspicious("exe", "pdf"));
        assert!(classifier.is_suspicious("zip", "docx"));
    }

    #[test]
    fn test_missing_extension_is_not_suspicious() {
        let classifier = MismatchClassifier::default();
        assert!(!classifier.is_suspicious("zip", ""));
        assert!(!classifier.is_suspicious("exe", ""));
    }

    #[test]
    fn test_benign_extensions() {
        let classifier = MismatchClassifier::default();
        for ext in ["tmp", "TEMP", "part"] {
            assert!(!classifier.is_suspicious("exe", ext), "{} should be benign", ext);
        }
        assert!(classifier.is_suspicious("exe", "crdownload"));
    }

    #[test]
    fn test_unknown_content_still_compared() {
        let classifier = MismatchClassifier::default();
        assert!(classifier.is_suspicious("bin", "jpg"));
        assert!(!classifier.is_suspicious("bin", "bin"));
    }

    #[test]
    fn test_verdict_implies_claim_properties() {
        let classifier = MismatchClassifier::default();
        let trues = ["pdf", "exe", "bin", "zip", "txt"];
        let claims = ["", "pdf", "PDF", "tmp", "part", "exe", "bin", "jpg"];
        for t in trues {
            for c in claims {
                if classifier.is_suspicious(t, c) {
                    let c = c.to_lowercase();
                    assert!(!c.is_empty());
                    assert!(!BENIGN_EXTENSIONS.contains(&c.as_str()));
                    assert_ne!(c, t.to_lowercase());
                }
            }
        }
    }
}
