use uuid::Uuid;

use crate::error::Result;
use crate::models::PaperRecord;
use crate::storage::database::Database;

/// The persistence surface the extraction and acquisition pipeline relies on.
///
/// The pipeline never writes paper state except through these calls.
pub trait PaperStore {
    fn save(&self, record: &PaperRecord) -> Result<()>;
    fn update_overview(&self, id: &Uuid, overview: &str) -> Result<()>;
    fn update_pdf_info(&self, id: &Uuid, path: &str, url: Option<&str>) -> Result<()>;
    /// Papers without a local PDF, optionally restricted to one conference.
    fn get_all_missing_pdf(&self, conference: Option<&str>) -> Result<Vec<PaperRecord>>;
}

impl PaperStore for Database {
    fn save(&self, record: &PaperRecord) -> Result<()> {
        self.save_paper(record)
    }

    fn update_overview(&self, id: &Uuid, overview: &str) -> Result<()> {
        Database::update_overview(self, id, overview)
    }

    fn update_pdf_info(&self, id: &Uuid, path: &str, url: Option<&str>) -> Result<()> {
        Database::update_pdf_info(self, id, path, url)
    }

    fn get_all_missing_pdf(&self, conference: Option<&str>) -> Result<Vec<PaperRecord>> {
        self.list_missing_pdf(conference)
    }
}
