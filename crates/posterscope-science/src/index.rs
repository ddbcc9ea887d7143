use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// One entry returned by an external title index, in index relevance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    pub external_id: String,
    pub title: String,
    pub artifact_url: String,
    pub authors: Vec<String>,
}

/// Remote bibliographic search by title.
#[async_trait]
pub trait TitleIndex: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<IndexEntry>>;

    fn name(&self) -> &str;
}
