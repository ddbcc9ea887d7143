pub mod config;
pub mod error;
pub mod models;
pub mod scan;
pub mod storage;

pub use config::{
    AcquisitionConfig, AppConfig, FolderConfig, MatchingConfig, ModelConfig, ProjectConfig,
};
pub use error::{PosterscopeError, Result};
pub use models::*;

pub use scan::{FileScanner, ScanStats};
pub use storage::database::Database;
pub use storage::store::PaperStore;
