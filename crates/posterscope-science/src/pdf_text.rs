use std::path::Path;

use lopdf::Document;

use crate::error::{Result, ScienceError};

/// Plain text of the leading pages of a PDF.
pub trait PageTextExtractor: Send + Sync {
    fn leading_pages_text(&self, pdf_path: &Path, max_pages: usize) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PageTextExtractor for LopdfExtractor {
    fn leading_pages_text(&self, pdf_path: &Path, max_pages: usize) -> Result<String> {
        if max_pages == 0 {
            return Ok(String::new());
        }

        let document = Document::load(pdf_path).map_err(|err| {
            ScienceError::PdfExtraction(format!(
                "lopdf failed to open {}: {err}",
                pdf_path.display()
            ))
        })?;
        let pages = document.get_pages();
        if pages.is_empty() {
            return Ok(String::new());
        }
        let page_numbers = pages.keys().copied().take(max_pages).collect::<Vec<u32>>();

        document.extract_text(&page_numbers).map_err(|err| {
            ScienceError::PdfExtraction(format!(
                "lopdf failed to extract text from {}: {err}",
                pdf_path.display()
            ))
        })
    }
}
