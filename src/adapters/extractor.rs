//! Regex-based result extraction from free-text agent output.
//!
//! Agents report their work as prose. This adapter recovers the
//! structured parts on a best-effort basis: lines announcing a file
//! change, and a commit hash following the word "commit". Output that
//! matches nothing yields an empty extraction, never an error.

use regex::Regex;

use crate::domain::ports::{ExtractedChanges, ResultExtractor};

pub struct RegexResultExtractor {
    file_re: Regex,
    commit_re: Regex,
}

impl RegexResultExtractor {
    /// Patterns are static and known-valid.
    #[allow(clippy::missing_panics_doc)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            // Lines like "modified src/main.rs" or "Wrote README.md"
            file_re: Regex::new(r"(?mi)\b(?:wrote|created|modified|updated)\s+(\S+)").unwrap(),
            // A short or full git hash following the word "commit"
            commit_re: Regex::new(r"(?mi)\bcommit\b[^0-9a-f]*([0-9a-f]{7,40})\b").unwrap(),
        }
    }
}

impl Default for RegexResultExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultExtractor for RegexResultExtractor {
    fn extract(&self, output: &str) -> ExtractedChanges {
        let mut files_changed: Vec<String> = Vec::new();
        for capture in self.file_re.captures_iter(output) {
            let path = capture[1].trim_end_matches(['.', ',', ':', ';']).to_string();
            if !path.is_empty() && !files_changed.contains(&path) {
                files_changed.push(path);
            }
        }
        let commit_hash = self
            .commit_re
            .captures(output)
            .map(|c| c[1].to_string());
        ExtractedChanges {
            files_changed,
            commit_hash,
        }
    }
}
