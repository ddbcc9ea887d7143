//! In-memory stand-ins for the network-facing traits.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use posterscope_ai::{BackendError, ModelBackend};
use posterscope_core::AcquisitionConfig;

use crate::error::{Result, ScienceError};
use crate::index::{IndexEntry, TitleIndex};
use crate::pdf_text::PageTextExtractor;

pub fn quiet_config() -> AcquisitionConfig {
    AcquisitionConfig {
        download_delay_secs: 0.0,
        download_timeout_secs: 5,
        ..AcquisitionConfig::default()
    }
}

pub struct StubIndex {
    entries: Option<Vec<IndexEntry>>,
    pub queries: Mutex<Vec<String>>,
}

impl StubIndex {
    pub fn with(entries: Vec<IndexEntry>) -> Self {
        Self {
            entries: Some(entries),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            entries: None,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TitleIndex for StubIndex {
    async fn search(&self, query: &str, _max_results: u32) -> Result<Vec<IndexEntry>> {
        self.queries.lock().unwrap().push(query.to_string());
        self.entries
            .clone()
            .ok_or_else(|| ScienceError::ApiError("stub".into(), "HTTP 503: down".into()))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Text backend with a fixed reply; also answers vision calls from a script.
pub struct StubBackend {
    reply: String,
    vision: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            vision: Mutex::new(Vec::new()),
        }
    }

    /// Vision replies are handed out in order; an exhausted script yields "".
    pub fn with_vision(replies: &[&str]) -> Self {
        Self {
            reply: String::new(),
            vision: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
        }
    }
}

#[async_trait]
impl ModelBackend for StubBackend {
    async fn probe(&self) -> bool {
        true
    }

    async fn analyze_image(
        &self,
        _image: &Path,
        _prompt: &str,
        _temperature: f32,
    ) -> std::result::Result<String, BackendError> {
        Ok(self.vision.lock().unwrap().pop().unwrap_or_default())
    }

    async fn generate(
        &self,
        _prompt: &str,
        _temperature: f32,
    ) -> std::result::Result<String, BackendError> {
        Ok(self.reply.clone())
    }

    fn model_id(&self) -> &str {
        "stub"
    }
}

pub struct StaticPages(String);

impl StaticPages {
    pub fn new(text: &str) -> Self {
        Self(text.to_string())
    }

    pub fn long() -> Self {
        Self::new(&"Transformers segment images well. ".repeat(10))
    }
}

impl PageTextExtractor for StaticPages {
    fn leading_pages_text(&self, _pdf_path: &Path, _max_pages: usize) -> Result<String> {
        Ok(self.0.clone())
    }
}
