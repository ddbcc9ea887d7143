//! Download service: ties remote acquisition to conference folders and the
//! paper store.

use std::path::PathBuf;

use posterscope_ai::ModelBackend;
use posterscope_core::{AppConfig, PaperRecord, PaperStore};
use serde::Serialize;
use tracing::{info, warn};

use crate::acquisition::{AcquisitionResult, RejectReason, RemoteAcquisition, remove_artifact};
use crate::error::Result;
use crate::index::TitleIndex;

/// Conference folder used for papers that were never assigned one.
pub const UNKNOWN_CONFERENCE: &str = "unknown";

const FILE_TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// `(title, reason)` for each failed paper.
    pub failures: Vec<(String, String)>,
}

pub struct DownloadService<I, B> {
    acquisition: RemoteAcquisition<I, B>,
    data_root: PathBuf,
    pdfs_subdir: String,
}

impl<I: TitleIndex, B: ModelBackend> DownloadService<I, B> {
    pub fn new(acquisition: RemoteAcquisition<I, B>, config: &AppConfig) -> Self {
        Self {
            acquisition,
            data_root: config.data_root(),
            pdfs_subdir: config.folders.pdfs_subdir.clone(),
        }
    }

    /// `<data_root>/<conference>/<pdfs>/<file name>`
    pub fn destination(&self, record: &PaperRecord, conference: &str) -> PathBuf {
        self.data_root
            .join(conference)
            .join(&self.pdfs_subdir)
            .join(pdf_file_name(record))
    }

    pub async fn download_paper(
        &self,
        store: &dyn PaperStore,
        record: &PaperRecord,
        conference: &str,
    ) -> AcquisitionResult {
        let dest = self.destination(record, conference);
        if dest.exists() {
            return AcquisitionResult::Rejected(RejectReason::AlreadyExists(dest));
        }

        let result = self.acquisition.acquire(&record.title, &dest).await;
        self.persist(store, record, result).await
    }

    pub async fn download_paper_from_url(
        &self,
        store: &dyn PaperStore,
        record: &PaperRecord,
        conference: &str,
        url: &str,
    ) -> AcquisitionResult {
        let dest = self.destination(record, conference);
        if dest.exists() {
            return AcquisitionResult::Rejected(RejectReason::AlreadyExists(dest));
        }

        let result = self.acquisition.acquire_from_url(url, &dest).await;
        self.persist(store, record, result).await
    }

    /// Acquire every paper without a PDF, one at a time. A failed paper is
    /// recorded and the batch continues.
    pub async fn download_all_missing(
        &self,
        store: &dyn PaperStore,
        conference: Option<&str>,
    ) -> Result<DownloadReport> {
        let papers = store.get_all_missing_pdf(conference)?;
        info!("found {} papers without a PDF", papers.len());

        let mut report = DownloadReport {
            attempted: papers.len(),
            ..DownloadReport::default()
        };

        for paper in &papers {
            let conf = paper
                .conference_name
                .as_deref()
                .or(conference)
                .unwrap_or(UNKNOWN_CONFERENCE);

            match self.download_paper(store, paper, conf).await.reject_reason() {
                None => {
                    info!("downloaded \"{}\"", paper.title);
                    report.succeeded += 1;
                }
                Some(reason) => {
                    info!("failed \"{}\": {reason}", paper.title);
                    report.failed += 1;
                    report.failures.push((paper.title.clone(), reason.to_string()));
                }
            }
        }

        info!(
            "download summary: {} succeeded, {} failed out of {}",
            report.succeeded, report.failed, report.attempted
        );
        Ok(report)
    }

    /// Record an acquired file in the store. The file is removed if the
    /// store refuses the PDF info; a refused overview only drops the summary.
    async fn persist(
        &self,
        store: &dyn PaperStore,
        record: &PaperRecord,
        result: AcquisitionResult,
    ) -> AcquisitionResult {
        let (path, source_url, hit, summary) = match result {
            AcquisitionResult::Acquired {
                path,
                source_url,
                hit,
                summary,
            } => (path, source_url, hit, summary),
            rejected => return rejected,
        };

        let pdf_path = path.to_string_lossy();
        if let Err(e) = store.update_pdf_info(&record.id, &pdf_path, Some(source_url.as_str())) {
            warn!("store update failed for {}: {e}", record.id);
            remove_artifact(&path).await;
            return AcquisitionResult::Rejected(RejectReason::Store(e.to_string()));
        }

        let summary = summary.filter(|text| match store.update_overview(&record.id, text) {
            Ok(()) => true,
            Err(e) => {
                warn!("overview not saved for {}: {e}", record.id);
                false
            }
        });

        AcquisitionResult::Acquired {
            path,
            source_url,
            hit,
            summary,
        }
    }
}

/// First 50 title characters made filesystem-safe, plus the short id.
pub fn pdf_file_name(record: &PaperRecord) -> String {
    let title_part: String = record
        .title
        .chars()
        .take(FILE_TITLE_CHARS)
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let title_part = title_part.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{title_part}_{}.pdf", record.short_id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexEntry;
    use crate::testing::{StaticPages, StubBackend, StubIndex, quiet_config};
    use mockito::Server;
    use posterscope_core::{Database, ModelConfig, PosterscopeError};
    use std::path::Path;
    use uuid::Uuid;

    const TITLE: &str = "Vision Transformers for Segmentation";

    fn service(
        data_root: &Path,
        entries: Vec<IndexEntry>,
    ) -> DownloadService<StubIndex, StubBackend> {
        let mut config = AppConfig::default();
        config.project.data_root = data_root.to_string_lossy().to_string();
        config.acquisition = quiet_config();

        let acquisition = RemoteAcquisition::new(
            StubIndex::with(entries),
            StubBackend::replying("**Problem Statement**: segmentation."),
            &ModelConfig::default(),
            config.acquisition.clone(),
        )
        .unwrap()
        .with_page_extractor(Box::new(StaticPages::long()));
        DownloadService::new(acquisition, &config)
    }

    fn hit(url: &str) -> IndexEntry {
        IndexEntry {
            external_id: "2401.00001v1".into(),
            title: TITLE.into(),
            artifact_url: url.into(),
            authors: vec![],
        }
    }

    fn paper(db: &Database, title: &str, conference: Option<&str>) -> PaperRecord {
        let mut record = PaperRecord::new(title);
        record.conference_name = conference.map(str::to_string);
        db.save_paper(&record).unwrap();
        record
    }

    async fn pdf_server() -> (mockito::ServerGuard, String) {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/pdf/ok.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(vec![b'%'; 2048])
            .create_async()
            .await;
        let url = format!("{}/pdf/ok.pdf", server.url());
        (server, url)
    }

    #[test]
    fn file_name_is_sanitized_and_suffixed() {
        let record = PaperRecord::new("Attention: Is All/You  Need?");
        let name = pdf_file_name(&record);
        assert_eq!(name, format!("Attention__Is_All_You_Need__{}.pdf", record.short_id()));
    }

    #[test]
    fn file_name_truncates_long_titles() {
        let record = PaperRecord::new("x".repeat(80));
        let name = pdf_file_name(&record);
        assert!(name.starts_with(&format!("{}_", "x".repeat(50))));
        assert!(name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn existing_destination_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let record = paper(&db, TITLE, Some("cvpr"));
        let svc = service(dir.path(), vec![]);

        let dest = svc.destination(&record, "cvpr");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"existing").unwrap();

        let result = svc.download_paper(&db, &record, "cvpr").await;
        assert_eq!(
            result.reject_reason().map(ToString::to_string).as_deref(),
            Some("PDF already exists locally")
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn acquired_paper_updates_store() {
        let (_server, url) = pdf_server().await;
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let record = paper(&db, TITLE, Some("cvpr"));
        let svc = service(dir.path(), vec![hit(&url)]);

        let result = svc.download_paper(&db, &record, "cvpr").await;
        assert!(result.is_acquired(), "{result:?}");

        let stored = db.get_paper(&record.id).unwrap();
        let dest = svc.destination(&record, "cvpr");
        assert!(stored.pdf_found);
        assert_eq!(stored.pdf_path.as_deref(), Some(dest.to_string_lossy().as_ref()));
        assert_eq!(stored.pdf_url.as_deref(), Some(url.as_str()));
        assert_eq!(
            stored.overview.as_deref(),
            Some("**Problem Statement**: segmentation.")
        );
        assert!(dest.starts_with(dir.path().join("cvpr").join("pdfs")));
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn store_failure_rolls_back_file() {
        let (_server, url) = pdf_server().await;
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let unsaved = PaperRecord::new(TITLE);
        let svc = service(dir.path(), vec![hit(&url)]);

        let result = svc.download_paper(&db, &unsaved, "cvpr").await;
        assert!(matches!(result.reject_reason(), Some(RejectReason::Store(_))));
        assert!(!svc.destination(&unsaved, "cvpr").exists());
    }

    /// Delegates to a database but refuses one kind of update.
    struct RefusingStore {
        db: Database,
        refuse_pdf_info: bool,
    }

    impl PaperStore for RefusingStore {
        fn save(&self, record: &PaperRecord) -> posterscope_core::Result<()> {
            self.db.save_paper(record)
        }

        fn update_overview(&self, id: &Uuid, overview: &str) -> posterscope_core::Result<()> {
            if !self.refuse_pdf_info {
                return Err(PosterscopeError::ValidationError("overview refused".into()));
            }
            self.db.update_overview(id, overview)
        }

        fn update_pdf_info(
            &self,
            id: &Uuid,
            path: &str,
            url: Option<&str>,
        ) -> posterscope_core::Result<()> {
            if self.refuse_pdf_info {
                return Err(PosterscopeError::ValidationError("pdf info refused".into()));
            }
            self.db.update_pdf_info(id, path, url)
        }

        fn get_all_missing_pdf(
            &self,
            conference: Option<&str>,
        ) -> posterscope_core::Result<Vec<PaperRecord>> {
            self.db.list_missing_pdf(conference)
        }
    }

    #[tokio::test]
    async fn refused_pdf_info_leaves_no_overview_behind() {
        let (_server, url) = pdf_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = RefusingStore {
            db: Database::open_in_memory().unwrap(),
            refuse_pdf_info: true,
        };
        let record = paper(&store.db, TITLE, Some("cvpr"));
        let svc = service(dir.path(), vec![hit(&url)]);

        let result = svc.download_paper(&store, &record, "cvpr").await;

        assert!(matches!(result.reject_reason(), Some(RejectReason::Store(_))));
        assert!(!svc.destination(&record, "cvpr").exists());
        let stored = store.db.get_paper(&record.id).unwrap();
        assert!(stored.overview.is_none());
        assert!(!stored.pdf_found);
    }

    #[tokio::test]
    async fn refused_overview_keeps_recorded_pdf() {
        let (_server, url) = pdf_server().await;
        let dir = tempfile::tempdir().unwrap();
        let store = RefusingStore {
            db: Database::open_in_memory().unwrap(),
            refuse_pdf_info: false,
        };
        let record = paper(&store.db, TITLE, Some("cvpr"));
        let svc = service(dir.path(), vec![hit(&url)]);

        let result = svc.download_paper(&store, &record, "cvpr").await;

        match result {
            AcquisitionResult::Acquired { path, summary, .. } => {
                assert!(summary.is_none());
                assert!(path.exists());
            }
            other => panic!("unexpected: {other:?}"),
        }
        let stored = store.db.get_paper(&record.id).unwrap();
        assert!(stored.pdf_found);
        assert!(stored.overview.is_none());
    }

    #[tokio::test]
    async fn manual_url_records_normalized_url() {
        let (_server, url) = pdf_server().await;
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let record = paper(&db, "Hand Picked", Some("iclr"));
        let svc = service(dir.path(), vec![]);

        let result = svc
            .download_paper_from_url(&db, &record, "iclr", &url)
            .await;
        assert!(result.is_acquired(), "{result:?}");
        let stored = db.get_paper(&record.id).unwrap();
        assert_eq!(stored.pdf_url.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn bulk_download_continues_past_failures() {
        let (_server, url) = pdf_server().await;
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let good = paper(&db, TITLE, Some("cvpr"));
        paper(&db, "Graph Databases Revisited", Some("cvpr"));
        paper(&db, TITLE, Some("other"));
        let svc = service(dir.path(), vec![hit(&url)]);

        let report = svc.download_all_missing(&db, Some("cvpr")).await.unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].0, "Graph Databases Revisited");
        assert!(report.failures[0].1.starts_with("low similarity"));
        assert!(db.get_paper(&good.id).unwrap().pdf_found);
        assert_eq!(db.list_missing_pdf(Some("other")).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn papers_without_conference_go_to_unknown() {
        let (_server, url) = pdf_server().await;
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let record = paper(&db, TITLE, None);
        let svc = service(dir.path(), vec![hit(&url)]);

        let report = svc.download_all_missing(&db, None).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(svc.destination(&record, UNKNOWN_CONFERENCE).exists());
    }
}
