use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use posterscope_core::AcquisitionConfig;
use regex::Regex;
use tracing::{debug, info};

use crate::arxiv::parser::{arxiv_id_from_abs_url, parse_atom_response, pdf_url};
use crate::error::Result;
use crate::http::RateLimitedClient;
use crate::index::{IndexEntry, TitleIndex};

static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));

pub struct ArxivClient {
    client: RateLimitedClient,
    base_url: String,
    timeout: Duration,
}

impl ArxivClient {
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        Ok(Self {
            client: RateLimitedClient::new(config.download_delay(), 1, &config.user_agent)?,
            base_url: config.search_url.clone(),
            timeout: config.search_timeout(),
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(base_url: String) -> Self {
        Self {
            client: RateLimitedClient::new(Duration::ZERO, 0, "posterscope-test")
                .expect("test client"),
            base_url,
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl TitleIndex for ArxivClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<IndexEntry>> {
        let params = [
            ("search_query", format!("all:\"{query}\"")),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
            ("sortBy", "relevance".to_string()),
            ("sortOrder", "descending".to_string()),
        ];
        debug!("arXiv search_query={}", params[0].1);

        let xml = self.client.get_text(&self.base_url, &params, self.timeout).await?;
        let entries = parse_atom_response(&xml)?;
        info!("arXiv returned {} results for \"{query}\"", entries.len());
        Ok(entries)
    }

    fn name(&self) -> &str {
        "arXiv"
    }
}

/// Punctuation replaced by spaces, whitespace collapsed.
pub fn clean_query_title(title: &str) -> String {
    NON_WORD_RE
        .replace_all(title, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rewrite an arXiv abstract-page URL to the direct PDF URL; other URLs pass through.
pub fn normalize_artifact_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("arxiv.org/abs/") {
        pdf_url(&arxiv_id_from_abs_url(url))
    } else {
        url.to_string()
    }
}
