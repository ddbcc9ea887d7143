//! Posterscope Science: PDF matching, arXiv acquisition, downloads and the
//! ingest pipeline.

pub mod error;
pub mod http;
pub mod similarity;
pub mod index;
pub mod arxiv;
pub mod matcher;
pub mod pdf_text;
pub mod acquisition;
pub mod service;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use error::{Result, ScienceError};
pub use index::{IndexEntry, TitleIndex};
pub use arxiv::ArxivClient;
pub use matcher::{LocalFileMatcher, MatchCandidate, MatchStats};
pub use pdf_text::{LopdfExtractor, PageTextExtractor};
pub use acquisition::{AcquisitionResult, RejectReason, RemoteAcquisition, RemoteHit};
pub use service::{DownloadReport, DownloadService, UNKNOWN_CONFERENCE, pdf_file_name};
pub use pipeline::{IngestReport, ReconcileReport, ingest_posters, reconcile_local_pdfs};
