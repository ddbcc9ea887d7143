//! Glue between the scanner, the extraction protocol, the local matcher and
//! the paper store.

use posterscope_ai::{ExtractionProtocol, ModelBackend};
use posterscope_core::{ConferenceFolder, FileScanner, PaperRecord, PaperStore};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::matcher::{LocalFileMatcher, MatchCandidate, MatchStats};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub processed: usize,
    pub saved: usize,
    /// `(file name, reason)` for each poster that produced no record.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub pdfs_scanned: usize,
    pub stats: MatchStats,
    pub matches: Vec<MatchCandidate>,
}

/// Extract every poster image of `conference` and save each success as a
/// new paper record.
pub async fn ingest_posters<B: ModelBackend>(
    protocol: &mut ExtractionProtocol<B>,
    scanner: &mut FileScanner,
    store: &dyn PaperStore,
    conference: &ConferenceFolder,
    limit: Option<usize>,
) -> Result<IngestReport> {
    let mut images = scanner.scan_images(&conference.images)?;
    if let Some(limit) = limit {
        images.truncate(limit);
    }
    info!(
        "ingesting {} poster images from {}",
        images.len(),
        conference.images.display()
    );

    let outcomes = protocol.extract_batch(&images).await;

    let mut report = IngestReport {
        processed: images.len(),
        ..IngestReport::default()
    };
    for (file, outcome) in images.iter().zip(outcomes) {
        if let Some(reason) = outcome.failure() {
            warn!("no paper extracted from {}: {reason}", file.name());
            report.failed.push((file.name(), reason.to_string()));
            continue;
        }
        if let Some(candidate) = outcome.into_candidate() {
            let record = PaperRecord::from_candidate(&candidate, Some(conference.name.as_str()));
            store.save(&record)?;
            info!("saved \"{}\" ({})", record.title, record.short_id());
            report.saved += 1;
        }
    }

    Ok(report)
}

/// Pair papers of `conference` that lack a PDF with files already in its
/// pdfs folder and record each match in the store.
pub fn reconcile_local_pdfs(
    matcher: &mut LocalFileMatcher,
    scanner: &mut FileScanner,
    store: &dyn PaperStore,
    conference: &ConferenceFolder,
) -> Result<ReconcileReport> {
    let files = scanner.scan_pdfs(&conference.pdfs)?;
    let papers = store.get_all_missing_pdf(Some(conference.name.as_str()))?;
    info!(
        "matching {} papers against {} local PDFs (threshold {:.2})",
        papers.len(),
        files.len(),
        matcher.threshold()
    );

    let matches = matcher.match_all(&papers, &files);
    for m in &matches {
        store.update_pdf_info(&m.paper_id, &m.path.to_string_lossy(), None)?;
    }

    Ok(ReconcileReport {
        pdfs_scanned: files.len(),
        stats: matcher.stats(),
        matches,
    })
}
