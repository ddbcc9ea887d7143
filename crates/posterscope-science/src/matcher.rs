//! Match paper records to local PDF files by file-name similarity.

use std::path::PathBuf;

use posterscope_core::{MatchingConfig, PaperRecord, SourceFile};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::similarity::{clean_for_filename, sequence_ratio};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub paper_id: Uuid,
    pub path: PathBuf,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub papers_checked: usize,
    pub pdfs_matched: usize,
    pub no_match: usize,
}

pub struct LocalFileMatcher {
    threshold: f64,
    stats: MatchStats,
}

impl LocalFileMatcher {
    pub fn new(config: &MatchingConfig) -> Self {
        Self::with_threshold(config.similarity_threshold)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            threshold,
            stats: MatchStats::default(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn stats(&self) -> MatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = MatchStats::default();
    }

    /// Best file for `title` if its score reaches the threshold.
    ///
    /// Files are visited in the given order and only a strictly higher score
    /// replaces the current best, so ties go to the earlier file.
    pub fn best_match<'a>(
        &self,
        title: &str,
        first_author: Option<&str>,
        files: &'a [SourceFile],
    ) -> Option<(&'a SourceFile, f64)> {
        let queries = search_strings(title, first_author);
        let mut best: Option<(&SourceFile, f64)> = None;
        let mut best_score = 0.0;

        for file in files {
            let stem = file.stem_lowercase();
            for query in &queries {
                let score = sequence_ratio(query, &stem);
                if score > best_score {
                    best_score = score;
                    best = Some((file, score));
                }
            }
        }

        best.filter(|(_, score)| *score >= self.threshold)
    }

    pub fn match_record(&self, record: &PaperRecord, files: &[SourceFile]) -> Option<MatchCandidate> {
        self.best_match(&record.title, record.first_author(), files)
            .map(|(file, score)| MatchCandidate {
                paper_id: record.id,
                path: file.path.clone(),
                score,
            })
    }

    /// Match every record; the caller persists the returned matches.
    pub fn match_all(&mut self, records: &[PaperRecord], files: &[SourceFile]) -> Vec<MatchCandidate> {
        let mut matches = Vec::new();
        for record in records {
            self.stats.papers_checked += 1;
            match self.match_record(record, files) {
                Some(candidate) => {
                    debug!(
                        "matched \"{}\" -> {} ({:.2})",
                        record.title,
                        candidate.path.display(),
                        candidate.score
                    );
                    self.stats.pdfs_matched += 1;
                    matches.push(candidate);
                }
                None => self.stats.no_match += 1,
            }
        }
        matches
    }
}

/// Cleaned title, then `author_title` and `title_author` when an author is known.
pub fn search_strings(title: &str, first_author: Option<&str>) -> Vec<String> {
    let title = clean_for_filename(title);
    let mut out = vec![title.clone()];
    if let Some(author) = first_author.map(clean_for_filename) {
        out.push(format!("{author}_{title}"));
        out.push(format!("{title}_{author}"));
    }
    out
}
