//! Text-model summaries: a long-form overview of one paper and a thematic
//! summary of a whole conference.

use posterscope_core::{AcquisitionConfig, ModelConfig, PaperRecord};
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{BackendError, ModelBackend};
use crate::prompts;

const MAX_CONFERENCE_PAPERS: usize = 100;
const OVERVIEW_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("insufficient text extracted ({chars} chars, need {min})")]
    TooShort { chars: usize, min: usize },
    #[error("no papers to summarize")]
    NoPapers,
    #[error("model returned an empty summary")]
    EmptyResponse,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

// ─── PaperSummarizer ───────────────────────────────────────

/// Structured overview of a paper from its extracted page text.
pub struct PaperSummarizer<B> {
    backend: B,
    temperature: f32,
    min_chars: usize,
    input_chars: usize,
}

impl<B: ModelBackend> PaperSummarizer<B> {
    pub fn new(backend: B, model: &ModelConfig, acquisition: &AcquisitionConfig) -> Self {
        Self {
            backend,
            temperature: model.temperature,
            min_chars: acquisition.min_summary_chars,
            input_chars: acquisition.summary_input_chars,
        }
    }

    /// One generation call; text shorter than the minimum never reaches the model.
    pub async fn summarize(&self, text: &str) -> Result<String, SummaryError> {
        let chars = text.trim().chars().count();
        if chars < self.min_chars {
            return Err(SummaryError::TooShort {
                chars,
                min: self.min_chars,
            });
        }

        let prompt = prompts::paper_overview(text, self.input_chars);
        debug!("requesting overview for {chars} chars of text");
        let reply = self.backend.generate(&prompt, self.temperature).await?;
        let summary = reply.trim();
        if summary.is_empty() {
            return Err(SummaryError::EmptyResponse);
        }
        Ok(summary.to_string())
    }
}

// ─── ConferenceSummarizer ──────────────────────────────────

pub struct ConferenceSummarizer<B> {
    backend: B,
    temperature: f32,
}

impl<B: ModelBackend> ConferenceSummarizer<B> {
    pub fn new(backend: B, model: &ModelConfig) -> Self {
        Self {
            backend,
            temperature: model.temperature,
        }
    }

    pub async fn summarize(&self, papers: &[PaperRecord]) -> Result<String, SummaryError> {
        if papers.is_empty() {
            return Err(SummaryError::NoPapers);
        }

        let digest = papers_digest(papers);
        info!(
            "summarizing {} papers",
            papers.len().min(MAX_CONFERENCE_PAPERS)
        );
        let reply = self
            .backend
            .generate(&prompts::conference_summary(&digest), self.temperature)
            .await?;
        let summary = reply.trim();
        if summary.is_empty() {
            return Err(SummaryError::EmptyResponse);
        }
        Ok(summary.to_string())
    }
}

/// `Title: **...**` lines with a short overview preview, blank-line separated.
pub fn papers_digest(papers: &[PaperRecord]) -> String {
    papers
        .iter()
        .take(MAX_CONFERENCE_PAPERS)
        .map(|paper| {
            let mut entry = format!("Title: **{}**", paper.title);
            if let Some(overview) = paper.overview.as_deref() {
                let preview: String = overview.chars().take(OVERVIEW_PREVIEW_CHARS).collect();
                entry.push_str("\n   ");
                entry.push_str(&preview);
                if overview.chars().count() > OVERVIEW_PREVIEW_CHARS {
                    entry.push_str("...");
                }
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    struct EchoBackend {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl EchoBackend {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelBackend for EchoBackend {
        async fn probe(&self) -> bool {
            true
        }

        async fn analyze_image(
            &self,
            _image: &Path,
            _prompt: &str,
            _temperature: f32,
        ) -> Result<String, BackendError> {
            unreachable!("summaries are text-only")
        }

        async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String, BackendError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    fn paper_summarizer(reply: &str) -> PaperSummarizer<EchoBackend> {
        PaperSummarizer::new(
            EchoBackend::new(reply),
            &ModelConfig::default(),
            &AcquisitionConfig::default(),
        )
    }

    #[tokio::test]
    async fn short_text_is_rejected_without_model_call() {
        let s = paper_summarizer("ignored");
        let err = s.summarize(&"a".repeat(40)).await.unwrap_err();
        assert!(matches!(err, SummaryError::TooShort { chars: 40, min: 100 }));
        assert!(s.backend.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn long_text_produces_trimmed_summary() {
        let s = paper_summarizer("  **Problem Statement**: things.\n");
        let summary = s.summarize(&"word ".repeat(50)).await.unwrap();
        assert_eq!(summary, "**Problem Statement**: things.");
        assert_eq!(s.backend.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_reply_is_a_failure() {
        let s = paper_summarizer("   ");
        let err = s.summarize(&"x".repeat(500)).await.unwrap_err();
        assert!(matches!(err, SummaryError::EmptyResponse));
    }

    #[test]
    fn digest_previews_long_overviews() {
        let mut long = PaperRecord::new("Long One");
        long.overview = Some("o".repeat(250));
        let short = PaperRecord::new("Short One");

        let digest = papers_digest(&[long, short]);
        let expected_preview = format!("Title: **Long One**\n   {}...", "o".repeat(200));
        assert!(digest.starts_with(&expected_preview));
        assert!(digest.ends_with("\n\nTitle: **Short One**"));
    }

    #[test]
    fn digest_caps_paper_count() {
        let papers: Vec<_> = (0..120)
            .map(|i| PaperRecord::new(format!("Paper {i}")))
            .collect();
        let digest = papers_digest(&papers);
        assert!(digest.contains("Paper 99**"));
        assert!(!digest.contains("Paper 100**"));
    }

    #[tokio::test]
    async fn conference_summary_requires_papers() {
        let s = ConferenceSummarizer::new(EchoBackend::new("x"), &ModelConfig::default());
        assert!(matches!(
            s.summarize(&[]).await.unwrap_err(),
            SummaryError::NoPapers
        ));

        let summary = s.summarize(&[PaperRecord::new("A")]).await.unwrap();
        assert_eq!(summary, "x");
        let prompt = s.backend.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Title: **A**"));
    }
}
