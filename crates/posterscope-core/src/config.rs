use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PosterscopeError, Result};
use crate::models::ConferenceFolder;

/// Root application configuration, loaded from `~/.config/posterscope/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub project: ProjectConfig,
    pub folders: FolderConfig,
    pub model: ModelConfig,
    pub matching: MatchingConfig,
    pub acquisition: AcquisitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub data_root: String,
    pub default_conference: String,
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub images_subdir: String,
    pub pdfs_subdir: String,
    pub output_subdir: String,
}

/// Vision/text backend settings handed to the extraction protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub name: String,
    pub temperature: f32,
    pub vision_max_tokens: u32,
    pub text_max_tokens: u32,
    pub probe_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    /// Make the single fallback attempt with the simplified prompt.
    pub retry_with_simple_prompt: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub similarity_threshold: f64,
}

/// Remote search, download and summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub search_url: String,
    pub max_search_results: u32,
    pub search_timeout_secs: u64,
    pub min_similarity: f64,
    /// Pause before every download; required by the arXiv usage policy.
    pub download_delay_secs: f64,
    pub download_timeout_secs: u64,
    pub min_file_bytes: u64,
    pub summary_pages: usize,
    pub min_summary_chars: usize,
    pub summary_input_chars: usize,
    pub extract_summary: bool,
    pub user_agent: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for ProjectConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("posterscope");

        Self {
            data_root: data_dir.join("conferences").to_string_lossy().to_string(),
            default_conference: "default".to_string(),
            database_path: data_dir
                .join("database")
                .join("papers.db")
                .to_string_lossy()
                .to_string(),
        }
    }
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            images_subdir: "images".to_string(),
            pdfs_subdir: "pdfs".to_string(),
            output_subdir: "output".to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            name: "llama3.2-vision:11b".to_string(),
            temperature: 0.1,
            vision_max_tokens: 2000,
            text_max_tokens: 4000,
            probe_timeout_secs: 5,
            generation_timeout_secs: 300,
            retry_with_simple_prompt: true,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            search_url: "http://export.arxiv.org/api/query".to_string(),
            max_search_results: 5,
            search_timeout_secs: 30,
            min_similarity: 0.6,
            download_delay_secs: 3.0,
            download_timeout_secs: 60,
            min_file_bytes: 1000,
            summary_pages: 5,
            min_summary_chars: 100,
            summary_input_chars: 8000,
            extract_summary: true,
            user_agent: "posterscope/0.1 (academic research tool)".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}

/// Longest pause honoured before a download.
pub const MAX_DOWNLOAD_DELAY_SECS: f64 = 3600.0;

impl AcquisitionConfig {
    /// Pre-download pause, clamped to `0..=MAX_DOWNLOAD_DELAY_SECS`. NaN counts as zero.
    pub fn download_delay(&self) -> Duration {
        let secs = self.download_delay_secs.max(0.0).min(MAX_DOWNLOAD_DELAY_SECS);
        Duration::from_secs_f64(secs)
    }

    pub fn validate(&self) -> Result<()> {
        let delay = self.download_delay_secs;
        if !(0.0..=MAX_DOWNLOAD_DELAY_SECS).contains(&delay) {
            return Err(PosterscopeError::ValidationError(format!(
                "acquisition.download_delay_secs must be between 0 and {MAX_DOWNLOAD_DELAY_SECS}, got {delay}"
            )));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(PosterscopeError::ValidationError(format!(
                "acquisition.min_similarity must be between 0 and 1, got {}",
                self.min_similarity
            )));
        }
        Ok(())
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/posterscope/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("POSTERSCOPE_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("posterscope")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.acquisition.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    pub fn data_root(&self) -> PathBuf {
        PathBuf::from(&self.project.data_root)
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.project.database_path)
    }

    /// Folder layout for a conference; `None` selects the default conference.
    pub fn conference(&self, name: Option<&str>) -> ConferenceFolder {
        let name = name.unwrap_or(&self.project.default_conference);
        ConferenceFolder::new(name, &self.data_root(), &self.folders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.matching.similarity_threshold, 0.6);
        assert_eq!(cfg.acquisition.min_file_bytes, 1000);
        assert_eq!(cfg.model.probe_timeout_secs, 5);
        assert_eq!(cfg.model.generation_timeout_secs, 300);
        assert!(cfg.model.retry_with_simple_prompt);
        assert!(!cfg.project.data_root.is_empty());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.model.name = "llava:13b".to_string();
        cfg.acquisition.download_delay_secs = 0.5;
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.model.name, "llava:13b");
        assert_eq!(loaded.acquisition.download_delay_secs, 0.5);
        assert_eq!(loaded.folders.pdfs_subdir, cfg.folders.pdfs_subdir);
    }

    #[test]
    fn test_partial_file_keeps_section_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[matching]\nsimilarity_threshold = 0.75\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.matching.similarity_threshold, 0.75);
        assert_eq!(loaded.acquisition.min_similarity, 0.6);
        assert_eq!(loaded.folders.images_subdir, "images");
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg =
            AppConfig::load_from(Path::new("/tmp/nonexistent_posterscope_config.toml")).unwrap();
        assert_eq!(cfg.model.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_infinite_delay_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[acquisition]\ndownload_delay_secs = inf\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, PosterscopeError::ValidationError(_)));
        assert!(err.to_string().contains("download_delay_secs"));
    }

    #[test]
    fn test_out_of_range_similarity_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[acquisition]\nmin_similarity = 1.5\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, PosterscopeError::ValidationError(_)));
    }

    #[test]
    fn test_download_delay_is_clamped() {
        let delay = |secs: f64| {
            AcquisitionConfig {
                download_delay_secs: secs,
                ..AcquisitionConfig::default()
            }
            .download_delay()
        };
        assert_eq!(delay(f64::INFINITY), Duration::from_secs(3600));
        assert_eq!(delay(1e300), Duration::from_secs(3600));
        assert_eq!(delay(f64::NAN), Duration::ZERO);
        assert_eq!(delay(-2.0), Duration::ZERO);
        assert_eq!(delay(0.25), Duration::from_millis(250));
    }

    #[test]
    fn test_conference_layout_uses_folder_names() {
        let mut cfg = AppConfig::default();
        cfg.project.data_root = "/data/conferences".to_string();
        let conf = cfg.conference(Some("cvpr2025"));
        assert_eq!(conf.pdfs, PathBuf::from("/data/conferences/cvpr2025/pdfs"));
        assert_eq!(conf.images, PathBuf::from("/data/conferences/cvpr2025/images"));

        let default = cfg.conference(None);
        assert_eq!(default.name, "default");
    }
}
