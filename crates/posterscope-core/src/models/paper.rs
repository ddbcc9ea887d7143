use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used when an artifact yields no usable title.
pub const UNTITLED: &str = "Untitled";

// ─── PaperCandidate ─────────────────────────────────────────

/// Paper metadata inferred from one source artifact.
///
/// Created once per successful extraction attempt and never mutated
/// afterwards; matching and acquisition attach their results to a
/// [`PaperRecord`] through the store instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperCandidate {
    title: String,
    authors: Vec<String>,
    overview: Option<String>,
    source_path: PathBuf,
}

impl PaperCandidate {
    pub fn new(
        title: Option<String>,
        authors: Vec<String>,
        overview: Option<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        let authors = authors
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        Self {
            title,
            authors,
            overview: overview.filter(|o| !o.trim().is_empty()),
            source_path: source_path.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    pub fn overview(&self) -> Option<&str> {
        self.overview.as_deref()
    }

    pub fn source_path(&self) -> &std::path::Path {
        &self.source_path
    }
}

// ─── PaperRecord ────────────────────────────────────────────

/// A paper as persisted by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conference_name: Option<String>,

    pub pdf_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,

    #[serde(default)]
    pub source_files: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u32,
}

impl PaperRecord {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            authors: Vec::new(),
            overview: None,
            conference_name: None,
            pdf_found: false,
            pdf_path: None,
            pdf_url: None,
            source_files: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Build a fresh record from an extracted candidate. The candidate is
    /// copied, never moved into shared state.
    pub fn from_candidate(candidate: &PaperCandidate, conference: Option<&str>) -> Self {
        let mut record = Self::new(candidate.title());
        record.authors = candidate.authors().to_vec();
        record.overview = candidate.overview().map(str::to_string);
        record.conference_name = conference.map(str::to_string);
        record.source_files = vec![candidate.source_path().to_string_lossy().to_string()];
        record
    }

    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    /// "A, B, +N more" style author line.
    pub fn authors_display(&self, max_authors: usize) -> String {
        if self.authors.is_empty() {
            return "Unknown Authors".to_string();
        }
        if self.authors.len() <= max_authors {
            return self.authors.join(", ");
        }
        let shown = self.authors[..max_authors].join(", ");
        let remaining = self.authors.len() - max_authors;
        format!("{shown}, +{remaining} more")
    }

    /// First eight characters of the id, used in file names and listings.
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_defaults_missing_title_to_untitled() {
        let candidate = PaperCandidate::new(None, vec![], None, "/posters/a.jpg");
        assert_eq!(candidate.title(), UNTITLED);

        let blank = PaperCandidate::new(Some("   ".into()), vec![], None, "/posters/a.jpg");
        assert_eq!(blank.title(), UNTITLED);
    }

    #[test]
    fn candidate_drops_empty_authors_but_keeps_duplicates() {
        let candidate = PaperCandidate::new(
            Some("Foo".into()),
            vec!["A".into(), "".into(), "A".into(), "  ".into()],
            Some(String::new()),
            "/posters/a.jpg",
        );
        assert_eq!(candidate.authors(), &["A".to_string(), "A".to_string()]);
        assert_eq!(candidate.overview(), None);
    }

    #[test]
    fn record_from_candidate_copies_fields() {
        let candidate = PaperCandidate::new(
            Some("Attention Is All You Need".into()),
            vec!["Ashish Vaswani".into()],
            Some("Transformers.".into()),
            "/posters/p1.png",
        );
        let record = PaperRecord::from_candidate(&candidate, Some("neurips"));

        assert_eq!(record.title, candidate.title());
        assert_eq!(record.first_author(), Some("Ashish Vaswani"));
        assert_eq!(record.conference_name.as_deref(), Some("neurips"));
        assert_eq!(record.source_files, vec!["/posters/p1.png".to_string()]);
        assert!(!record.pdf_found);
    }

    #[test]
    fn authors_display_truncates() {
        let mut record = PaperRecord::new("X");
        assert_eq!(record.authors_display(3), "Unknown Authors");

        record.authors = vec!["A".into(), "B".into(), "C".into(), "D".into()];
        assert_eq!(record.authors_display(2), "A, B, +2 more");
        assert_eq!(record.authors_display(10), "A, B, C, D");
    }
}
