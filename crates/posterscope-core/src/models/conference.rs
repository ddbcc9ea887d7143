use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::FolderConfig;
use crate::error::Result;

/// On-disk layout of one conference: `<data_root>/<name>/{images,pdfs,output}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferenceFolder {
    pub name: String,
    pub root: PathBuf,
    pub images: PathBuf,
    pub pdfs: PathBuf,
    pub output: PathBuf,
}

/// Which folders of a conference exist on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FolderStatus {
    pub root: bool,
    pub images: bool,
    pub pdfs: bool,
    pub output: bool,
}

impl ConferenceFolder {
    pub fn new(name: &str, data_root: &Path, folders: &FolderConfig) -> Self {
        let root = data_root.join(name);
        Self {
            name: name.to_string(),
            images: root.join(&folders.images_subdir),
            pdfs: root.join(&folders.pdfs_subdir),
            output: root.join(&folders.output_subdir),
            root,
        }
    }

    pub fn validate(&self) -> FolderStatus {
        FolderStatus {
            root: self.root.exists(),
            images: self.images.exists(),
            pdfs: self.pdfs.exists(),
            output: self.output.exists(),
        }
    }

    pub fn create_missing(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.images)?;
        std::fs::create_dir_all(&self.pdfs)?;
        std::fs::create_dir_all(&self.output)?;
        Ok(())
    }
}

/// Sorted names of the conference folders under `data_root`.
pub fn list_conferences(data_root: &Path) -> Result<Vec<String>> {
    if !data_root.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(data_root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_missing_then_validate() {
        let dir = TempDir::new().unwrap();
        let conf = ConferenceFolder::new("iclr", dir.path(), &FolderConfig::default());
        assert!(!conf.validate().root);

        conf.create_missing().unwrap();
        let status = conf.validate();
        assert!(status.root && status.images && status.pdfs && status.output);
    }

    #[test]
    fn list_conferences_sorted_dirs_only() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("neurips")).unwrap();
        std::fs::create_dir(dir.path().join("cvpr")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let names = list_conferences(dir.path()).unwrap();
        assert_eq!(names, vec!["cvpr".to_string(), "neurips".to_string()]);
        assert!(list_conferences(&dir.path().join("missing")).unwrap().is_empty());
    }
}
