//! Remote acquisition: search the title index, gate the top hit by title
//! overlap, download the PDF, extract a summary, and roll back the file on
//! any failure after it was written.

use std::path::{Path, PathBuf};
use std::time::Duration;

use posterscope_ai::{ModelBackend, PaperSummarizer};
use posterscope_core::{AcquisitionConfig, ModelConfig};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::arxiv::{clean_query_title, normalize_artifact_url};
use crate::error::{Result, ScienceError};
use crate::http::RateLimitedClient;
use crate::index::{IndexEntry, TitleIndex};
use crate::pdf_text::{LopdfExtractor, PageTextExtractor};
use crate::similarity::overlap_similarity;

/// The single index hit considered for a title.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteHit {
    pub external_id: String,
    pub title: String,
    pub artifact_url: String,
    pub authors: Vec<String>,
    pub similarity: f64,
}

impl RemoteHit {
    fn from_entry(entry: IndexEntry, query_title: &str) -> Self {
        let similarity = overlap_similarity(query_title, &entry.title);
        Self {
            external_id: entry.external_id,
            title: entry.title,
            artifact_url: entry.artifact_url,
            authors: entry.authors,
            similarity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("paper not found on arXiv")]
    NotFound,
    #[error("arXiv search failed: {0}")]
    SearchFailed(String),
    #[error("low similarity ({similarity:.2}): '{found_title}'")]
    LowConfidence { similarity: f64, found_title: String },
    #[error("failed to download PDF: {0}")]
    DownloadFailed(String),
    #[error("failed to extract overview from PDF: {0}")]
    SummaryFailed(String),
    #[error("filesystem error: {0}")]
    Filesystem(String),
    #[error("PDF already exists locally")]
    AlreadyExists(PathBuf),
    #[error("store update failed: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquisitionResult {
    Acquired {
        path: PathBuf,
        source_url: String,
        hit: Option<RemoteHit>,
        summary: Option<String>,
    },
    Rejected(RejectReason),
}

impl AcquisitionResult {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired { .. })
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Acquired { .. } => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

pub struct RemoteAcquisition<I, B> {
    index: I,
    http: RateLimitedClient,
    summarizer: PaperSummarizer<B>,
    pages: Box<dyn PageTextExtractor>,
    config: AcquisitionConfig,
}

impl<I: TitleIndex, B: ModelBackend> RemoteAcquisition<I, B> {
    pub fn new(
        index: I,
        backend: B,
        model: &ModelConfig,
        config: AcquisitionConfig,
    ) -> Result<Self> {
        Ok(Self {
            index,
            http: RateLimitedClient::new(Duration::ZERO, 0, &config.user_agent)?,
            summarizer: PaperSummarizer::new(backend, model, &config),
            pages: Box::new(LopdfExtractor),
            config,
        })
    }

    pub fn with_page_extractor(mut self, pages: Box<dyn PageTextExtractor>) -> Self {
        self.pages = pages;
        self
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Search by title and, when the top hit is similar enough, download it
    /// to `destination`.
    pub async fn acquire(&self, title: &str, destination: &Path) -> AcquisitionResult {
        let query = clean_query_title(title);
        info!("searching {} for \"{query}\"", self.index.name());

        let entries = match self
            .index
            .search(&query, self.config.max_search_results)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!("search failed for \"{title}\": {e}");
                return AcquisitionResult::Rejected(RejectReason::SearchFailed(e.to_string()));
            }
        };

        let Some(top) = entries.into_iter().next() else {
            return AcquisitionResult::Rejected(RejectReason::NotFound);
        };
        let hit = RemoteHit::from_entry(top, title);
        info!(
            "top hit {} \"{}\" similarity {:.2}",
            hit.external_id, hit.title, hit.similarity
        );

        if hit.similarity < self.config.min_similarity {
            return AcquisitionResult::Rejected(RejectReason::LowConfidence {
                similarity: hit.similarity,
                found_title: hit.title,
            });
        }

        let url = hit.artifact_url.clone();
        self.download_and_summarize(&url, destination, Some(hit)).await
    }

    /// Manual-URL variant: no search and no similarity gate.
    pub async fn acquire_from_url(&self, url: &str, destination: &Path) -> AcquisitionResult {
        let url = normalize_artifact_url(url);
        info!("downloading from manual URL {url}");
        self.download_and_summarize(&url, destination, None).await
    }

    async fn download_and_summarize(
        &self,
        url: &str,
        destination: &Path,
        hit: Option<RemoteHit>,
    ) -> AcquisitionResult {
        sleep(self.config.download_delay()).await;

        if let Err(reason) = self.download(url, destination).await {
            return AcquisitionResult::Rejected(reason);
        }

        let summary = if self.config.extract_summary {
            match self.summarize(destination).await {
                Ok(summary) => Some(summary),
                Err(reason) => {
                    remove_artifact(destination).await;
                    return AcquisitionResult::Rejected(reason);
                }
            }
        } else {
            None
        };

        AcquisitionResult::Acquired {
            path: destination.to_path_buf(),
            source_url: url.to_string(),
            hit,
            summary,
        }
    }

    async fn download(&self, url: &str, destination: &Path) -> std::result::Result<u64, RejectReason> {
        let file = self
            .http
            .download_to_file(url, destination, self.config.download_timeout())
            .await
            .map_err(|e| match e {
                ScienceError::Io(io) => RejectReason::Filesystem(io.to_string()),
                other => RejectReason::DownloadFailed(other.to_string()),
            })?;

        let content_type = file.content_type.as_deref().unwrap_or_default();
        if !content_type.contains("application/pdf") {
            warn!("content type is '{content_type}', not PDF: {url}");
        }

        if file.bytes < self.config.min_file_bytes {
            warn!("downloaded file is suspiciously small ({} bytes)", file.bytes);
            remove_artifact(destination).await;
            return Err(RejectReason::DownloadFailed(format!(
                "file too small ({} bytes)",
                file.bytes
            )));
        }

        info!("saved {} bytes to {}", file.bytes, destination.display());
        Ok(file.bytes)
    }

    async fn summarize(&self, pdf_path: &Path) -> std::result::Result<String, RejectReason> {
        let text = self
            .pages
            .leading_pages_text(pdf_path, self.config.summary_pages)
            .map_err(|e| RejectReason::SummaryFailed(e.to_string()))?;

        self.summarizer
            .summarize(&text)
            .await
            .map_err(|e| RejectReason::SummaryFailed(e.to_string()))
    }
}

/// Delete an artifact written by a failed workflow. A failed delete is
/// logged and otherwise ignored.
pub(crate) async fn remove_artifact(path: &Path) {
    if !path.exists() {
        return;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("rolled back {}", path.display()),
        Err(e) => warn!("failed to remove {}: {e}", path.display()),
    }
}
