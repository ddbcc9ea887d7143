//! Title similarity measures.
//!
//! Two independent scores are kept on purpose: a sequence ratio for matching
//! titles against (truncated, underscored) file names, and a token overlap
//! for gating remote search hits against a natural-language query.

use std::collections::HashSet;

/// Words dropped before building filename search strings.
const FILENAME_STOP_WORDS: &[&str] = &["a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for"];

/// Words ignored by the overlap score.
const OVERLAP_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Case-insensitive sequence-alignment ratio in `[0, 1]`.
///
/// An empty side scores 0.0 so it can never pass a match threshold.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}

/// Jaccard similarity over lowercase, stop-word-filtered whitespace tokens.
pub fn overlap_similarity(a: &str, b: &str) -> f64 {
    let left = content_tokens(a);
    let right = content_tokens(b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

fn content_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| !OVERLAP_STOP_WORDS.contains(w))
        .map(String::from)
        .collect()
}

/// Lowercase, drop stop words, join with `_`, keep only `[alnum_]`.
pub fn clean_for_filename(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| !FILENAME_STOP_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(sequence_ratio("attention", "attention"), 1.0);
        assert_eq!(sequence_ratio("Attention", "attention"), 1.0);
    }

    #[test]
    fn disjoint_strings_score_low() {
        assert!(sequence_ratio("abc", "xyz") < 0.3);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(sequence_ratio("", ""), 0.0);
        assert_eq!(sequence_ratio("", "abc"), 0.0);
        assert_eq!(overlap_similarity("", "abc"), 0.0);
        assert_eq!(overlap_similarity("the of", "the of"), 0.0);
    }

    #[test]
    fn score_degrades_with_edits() {
        let base = "vision_transformers";
        let one = sequence_ratio(base, "vision_transformerz");
        let three = sequence_ratio(base, "vision_transfxxxerz");
        assert!(one < 1.0);
        assert!(three < one);
    }

    #[test]
    fn suffixed_filename_still_matches() {
        let score = sequence_ratio("attention_is_all_you_need", "attention_is_all_you_need_v2");
        assert!(score > 0.9, "score = {score}");
    }

    #[test]
    fn overlap_ignores_stop_words_and_case() {
        let score = overlap_similarity("Attention Is All You Need", "attention is all you need");
        assert_eq!(score, 1.0);

        let partial = overlap_similarity("Vision Transformers", "Vision Models");
        assert!((partial - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_titles_overlap_poorly() {
        let score = overlap_similarity(
            "Vision Transformers for Segmentation",
            "Unrelated Survey on Databases",
        );
        assert!(score < 0.6);
    }

    #[test]
    fn filename_cleaning() {
        assert_eq!(
            clean_for_filename("The Art of Learning: A Survey!"),
            "art_of_learning_survey"
        );
        assert_eq!(clean_for_filename("Attention Is All You Need"), "attention_is_all_you_need");
        assert_eq!(clean_for_filename(""), "");
    }
}
