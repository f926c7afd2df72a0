//! Result-extraction port.
//!
//! Workers report changes as free text; recovering structure from it is
//! inherently lossy. The seam exists so a structured-output worker can
//! bypass text scraping entirely.

/// Structure recovered from an agent's free-text output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedChanges {
    pub files_changed: Vec<String>,
    pub commit_hash: Option<String>,
}

/// Best-effort parser over agent output. Implementations must never
/// fail; an unparseable response yields an empty extraction.
pub trait ResultExtractor: Send + Sync {
    fn extract(&self, output: &str) -> ExtractedChanges;
}
