//! Poster extraction protocol: one detailed attempt, at most one simplified
//! fallback, recovery of the reply into a [`PaperCandidate`].

use std::path::Path;
use std::time::{Duration, Instant};

use posterscope_core::{ModelConfig, PaperCandidate, SourceFile};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, ModelBackend};
use crate::prompts;
use crate::recovery::recover;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptVariant {
    Detailed,
    Simple,
}

impl PromptVariant {
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Detailed => prompts::POSTER_EXTRACTION_DETAILED,
            Self::Simple => prompts::POSTER_EXTRACTION_SIMPLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("backend unreachable")]
    BackendUnreachable,
    #[error("backend timed out")]
    BackendTimeout,
    #[error("backend error: {0}")]
    Backend(String),
    #[error("failed to parse model response as JSON")]
    MalformedResponse,
}

impl From<BackendError> for ExtractionFailure {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unreachable(_) => Self::BackendUnreachable,
            BackendError::Timeout(_) => Self::BackendTimeout,
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Result of extracting one artifact. Exactly one side is populated.
#[derive(Debug, Clone)]
pub enum ExtractionOutcome {
    Success {
        candidate: PaperCandidate,
        raw_response: String,
        elapsed: Duration,
        variant: PromptVariant,
        retried: bool,
    },
    Failure {
        reason: ExtractionFailure,
        raw_response: Option<String>,
        elapsed: Duration,
        variant: PromptVariant,
        retried: bool,
    },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn candidate(&self) -> Option<&PaperCandidate> {
        match self {
            Self::Success { candidate, .. } => Some(candidate),
            Self::Failure { .. } => None,
        }
    }

    pub fn into_candidate(self) -> Option<PaperCandidate> {
        match self {
            Self::Success { candidate, .. } => Some(candidate),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason, .. } => Some(reason),
        }
    }

    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Self::Success { raw_response, .. } => Some(raw_response),
            Self::Failure { raw_response, .. } => raw_response.as_deref(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Success { elapsed, .. } | Self::Failure { elapsed, .. } => *elapsed,
        }
    }

    pub fn variant(&self) -> PromptVariant {
        match self {
            Self::Success { variant, .. } | Self::Failure { variant, .. } => *variant,
        }
    }

    pub fn retried(&self) -> bool {
        match self {
            Self::Success { retried, .. } | Self::Failure { retried, .. } => *retried,
        }
    }

    fn with_elapsed(mut self, total: Duration) -> Self {
        match &mut self {
            Self::Success { elapsed, .. } | Self::Failure { elapsed, .. } => *elapsed = total,
        }
        self
    }
}

/// Counters owned by one protocol instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Backend calls made.
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    pub malformed_json: u32,
    pub retries: u32,
}

pub struct ExtractionProtocol<B> {
    backend: B,
    temperature: f32,
    retry_with_simple_prompt: bool,
    stats: ExtractionStats,
}

impl<B: ModelBackend> ExtractionProtocol<B> {
    pub fn new(backend: B, config: &ModelConfig) -> Self {
        Self {
            backend,
            temperature: config.temperature,
            retry_with_simple_prompt: config.retry_with_simple_prompt,
            stats: ExtractionStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ExtractionStats::default();
    }

    pub async fn extract(&mut self, image: &Path) -> ExtractionOutcome {
        let started = Instant::now();

        if !self.backend.probe().await {
            warn!("model backend is not reachable; skipping {}", image.display());
            self.stats.failures += 1;
            return ExtractionOutcome::Failure {
                reason: ExtractionFailure::BackendUnreachable,
                raw_response: None,
                elapsed: started.elapsed(),
                variant: PromptVariant::Detailed,
                retried: false,
            };
        }

        let mut outcome = self.attempt(image, PromptVariant::Detailed, false).await;

        if !outcome.is_success() && self.retry_with_simple_prompt {
            info!(
                "retrying {} with simple prompt ({})",
                image.display(),
                outcome.failure().map(ToString::to_string).unwrap_or_default()
            );
            self.stats.retries += 1;
            outcome = self.attempt(image, PromptVariant::Simple, true).await;
        }

        if outcome.is_success() {
            self.stats.successes += 1;
        } else {
            self.stats.failures += 1;
        }
        outcome.with_elapsed(started.elapsed())
    }

    /// Extract each file in order, one backend conversation at a time.
    pub async fn extract_batch(&mut self, files: &[SourceFile]) -> Vec<ExtractionOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            info!("[{}/{}] extracting {}", i + 1, files.len(), file.name());
            outcomes.push(self.extract(file.path()).await);
        }
        outcomes
    }

    async fn attempt(
        &mut self,
        image: &Path,
        variant: PromptVariant,
        retried: bool,
    ) -> ExtractionOutcome {
        let started = Instant::now();
        self.stats.attempts += 1;
        debug!("sending {} with {:?} prompt", image.display(), variant);

        let reply = self
            .backend
            .analyze_image(image, variant.prompt(), self.temperature)
            .await;
        let elapsed = started.elapsed();

        let raw = match reply {
            Ok(raw) => raw,
            Err(e) => {
                warn!("backend call failed after {:.1}s: {e}", elapsed.as_secs_f64());
                return ExtractionOutcome::Failure {
                    reason: e.into(),
                    raw_response: None,
                    elapsed,
                    variant,
                    retried,
                };
            }
        };
        info!("model responded in {:.1}s", elapsed.as_secs_f64());

        match recover(&raw) {
            Some(paper) => {
                debug!("reply recovered via {:?}", paper.strategy);
                ExtractionOutcome::Success {
                    candidate: paper.into_candidate(image),
                    raw_response: raw,
                    elapsed,
                    variant,
                    retried,
                }
            }
            None => {
                self.stats.malformed_json += 1;
                warn!("could not recover JSON from reply for {}", image.display());
                ExtractionOutcome::Failure {
                    reason: ExtractionFailure::MalformedResponse,
                    raw_response: Some(raw),
                    elapsed,
                    variant,
                    retried,
                }
            }
        }
    }
}
