pub mod client;
pub mod parser;

pub use client::{ArxivClient, clean_query_title, normalize_artifact_url};
pub use parser::parse_atom_response;
