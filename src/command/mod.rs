//! Voice command classification.
//!
//! Maps a raw transcript to one of the fixed command intents. Matching is
//! case-insensitive substring containment over a small keyword table, checked
//! in a fixed priority order: reading, then detection, then exit. A transcript
//! matching keywords from two rules resolves to the earlier rule.

/// A command intent derived from one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Launch the reading/OCR module.
    StartReading,
    /// Launch the object-detection module.
    StartDetection,
    /// Shut down gracefully.
    Exit,
    /// Anything that matched no rule, including empty input.
    Unknown,
}

const READING_KEYWORDS: &[&str] = &["read", "reading"];
const DETECTION_KEYWORDS: &[&str] = &["detect", "object"];
const EXIT_KEYWORDS: &[&str] = &["exit", "quit"];

impl Command {
    /// Classify a transcript into a command intent.
    ///
    /// Pure and total: never fails, unmatched or empty input yields
    /// [`Command::Unknown`]. Priority order is reading before detection
    /// before exit.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Self::Unknown;
        }
        let matches = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));
        if matches(READING_KEYWORDS) {
            Self::StartReading
        } else if matches(DETECTION_KEYWORDS) {
            Self::StartDetection
        } else if matches(EXIT_KEYWORDS) {
            Self::Exit
        } else {
            Self::Unknown
        }
    }
}
