//! Posterscope AI: model backends, response recovery, extraction protocol
//! and summarizers.

pub mod backend;
pub mod extraction;
pub mod prompts;
pub mod recovery;
pub mod summary;

pub use backend::{BackendError, ModelBackend, OllamaClient};
pub use extraction::{
    ExtractionFailure, ExtractionOutcome, ExtractionProtocol, ExtractionStats, PromptVariant,
};
pub use recovery::{RecoveredPaper, RecoveryStrategy, recover};
pub use summary::{ConferenceSummarizer, PaperSummarizer, SummaryError};
