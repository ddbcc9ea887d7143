use quick_xml::de::from_str;
use serde::Deserialize;

use crate::error::{Result, ScienceError};
use crate::index::IndexEntry;

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

/// Parse an arXiv Atom response in feed order.
///
/// Parsing stops at the first entry without an id or title, so a malformed
/// leading entry yields no results instead of promoting the next one.
pub fn parse_atom_response(xml: &str) -> Result<Vec<IndexEntry>> {
    let feed: AtomFeed =
        from_str(xml).map_err(|e| ScienceError::Parse(format!("invalid atom xml: {e}")))?;

    Ok(feed.entries.into_iter().map_while(parse_entry).collect())
}

fn parse_entry(entry: AtomEntry) -> Option<IndexEntry> {
    let raw_id = entry.id?;
    let external_id = arxiv_id_from_abs_url(&raw_id);
    let title = clean_text(&entry.title?);
    if external_id.is_empty() || title.is_empty() {
        return None;
    }

    let authors = entry
        .authors
        .into_iter()
        .filter_map(|author| author.name)
        .map(|name| clean_text(&name))
        .filter(|name| !name.is_empty())
        .collect();

    Some(IndexEntry {
        artifact_url: pdf_url(&external_id),
        external_id,
        title,
        authors,
    })
}

/// `http://arxiv.org/abs/1706.03762v7` → `1706.03762v7`.
pub fn arxiv_id_from_abs_url(url: &str) -> String {
    let url = url.trim();
    match url.rsplit_once("/abs/") {
        Some((_, id)) => id.trim().to_string(),
        None => url.to_string(),
    }
}

pub fn pdf_url(arxiv_id: &str) -> String {
    format!("https://arxiv.org/pdf/{arxiv_id}.pdf")
}

fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
