//! Conference folder scanning: enumerate poster images and local PDFs.
//!
//! Only the immediate directory is read; results are sorted by file name so
//! downstream matching sees a stable candidate order.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{FileKind, SourceFile};

/// Counters accumulated across scans until [`FileScanner::reset_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub total_scanned: usize,
    pub pdfs_found: usize,
    pub images_found: usize,
    pub skipped: usize,
}

pub struct FileScanner {
    image_extensions: HashSet<String>,
    pdf_extensions: HashSet<String>,
    stats: ScanStats,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(&["jpg", "jpeg", "png", "heic"], &["pdf"])
    }
}

impl FileScanner {
    pub fn new(image_extensions: &[&str], pdf_extensions: &[&str]) -> Self {
        let normalize = |exts: &[&str]| {
            exts.iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect::<HashSet<_>>()
        };
        Self {
            image_extensions: normalize(image_extensions),
            pdf_extensions: normalize(pdf_extensions),
            stats: ScanStats::default(),
        }
    }

    pub fn scan_images(&mut self, dir: &Path) -> Result<Vec<SourceFile>> {
        self.scan_directory(dir, FileKind::Image)
    }

    pub fn scan_pdfs(&mut self, dir: &Path) -> Result<Vec<SourceFile>> {
        self.scan_directory(dir, FileKind::Pdf)
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ScanStats::default();
    }

    fn scan_directory(&mut self, dir: &Path, wanted: FileKind) -> Result<Vec<SourceFile>> {
        if !dir.exists() {
            warn!("path does not exist: {}", dir.display());
            return Ok(Vec::new());
        }
        if !dir.is_dir() {
            warn!("path is not a directory: {}", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            self.stats.total_scanned += 1;

            let Some(kind) = self.detect_kind(&path) else {
                self.stats.skipped += 1;
                continue;
            };
            if kind != wanted {
                continue;
            }

            let metadata = match std::fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    warn!("error reading {}: {e}", path.display());
                    self.stats.skipped += 1;
                    continue;
                }
            };

            match kind {
                FileKind::Pdf => self.stats.pdfs_found += 1,
                FileKind::Image => self.stats.images_found += 1,
            }
            files.push(SourceFile {
                path,
                kind,
                size_bytes: metadata.len(),
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        files.sort_by_key(|f| f.name());
        debug!("found {} {:?} files in {}", files.len(), wanted, dir.display());
        Ok(files)
    }

    fn detect_kind(&self, path: &Path) -> Option<FileKind> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        if self.pdf_extensions.contains(&ext) {
            Some(FileKind::Pdf)
        } else if self.image_extensions.contains(&ext) {
            Some(FileKind::Image)
        } else {
            None
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────
